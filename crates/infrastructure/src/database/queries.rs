//! SQL shared by the PostgreSQL and SQLite ledger stores.
//!
//! Both dialects accept `$N` placeholders, `ON CONFLICT ... DO NOTHING`
//! and `RETURNING`. Every mutation is one conditional statement so that
//! concurrent callers cannot push a row past its invariant.

pub const WORKER_COLUMNS: &str = "id, address, pending_amount, locked_amount";
pub const REQUESTER_COLUMNS: &str = "id, address";
pub const TASK_COLUMNS: &str =
    "id, requester_id, title, amount, completion_quota, submission_count, signature, created_at";
pub const OPTION_COLUMNS: &str = "id, task_id, image_url";
pub const SUBMISSION_COLUMNS: &str = "id, worker_id, task_id, option_id, amount, created_at";
pub const PAYOUT_COLUMNS: &str = "id, worker_id, amount, status, signature, created_at";

pub fn select_worker() -> String {
    format!("SELECT {WORKER_COLUMNS} FROM workers WHERE id = $1")
}

pub fn select_worker_by_address() -> String {
    format!("SELECT {WORKER_COLUMNS} FROM workers WHERE address = $1")
}

/// SQLite has no row locks; a no-op write takes the database write lock.
pub const TOUCH_WORKER: &str = "UPDATE workers SET id = id WHERE id = $1";

pub const INSERT_WORKER: &str = r#"
    INSERT INTO workers (address, pending_amount, locked_amount)
    VALUES ($1, 0, 0)
    ON CONFLICT (address) DO NOTHING
"#;

pub fn select_requester() -> String {
    format!("SELECT {REQUESTER_COLUMNS} FROM requesters WHERE id = $1")
}

pub fn select_requester_by_address() -> String {
    format!("SELECT {REQUESTER_COLUMNS} FROM requesters WHERE address = $1")
}

pub const INSERT_REQUESTER: &str = r#"
    INSERT INTO requesters (address)
    VALUES ($1)
    ON CONFLICT (address) DO NOTHING
"#;

/// Oldest task with room left that the worker has not answered yet.
pub fn select_next_task() -> String {
    format!(
        r#"
        SELECT {TASK_COLUMNS} FROM tasks
        WHERE submission_count < completion_quota
          AND NOT EXISTS (
              SELECT 1 FROM submissions s
              WHERE s.task_id = tasks.id AND s.worker_id = $1
          )
        ORDER BY id ASC
        LIMIT 1
        "#
    )
}

pub fn select_task() -> String {
    format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1")
}

pub fn insert_task() -> String {
    format!(
        r#"
        INSERT INTO tasks (requester_id, title, amount, completion_quota, submission_count, signature, created_at)
        VALUES ($1, $2, $3, $4, 0, $5, $6)
        RETURNING {TASK_COLUMNS}
        "#
    )
}

pub fn select_task_options() -> String {
    format!("SELECT {OPTION_COLUMNS} FROM task_options WHERE task_id = $1 ORDER BY id ASC")
}

pub fn insert_task_option() -> String {
    format!(
        "INSERT INTO task_options (task_id, image_url) VALUES ($1, $2) RETURNING {OPTION_COLUMNS}"
    )
}

pub const SELECT_OPTION_TALLIES: &str = r#"
    SELECT o.id, o.task_id, o.image_url, COUNT(s.id) AS count
    FROM task_options o
    LEFT JOIN submissions s ON s.option_id = o.id
    WHERE o.task_id = $1
    GROUP BY o.id, o.task_id, o.image_url
    ORDER BY o.id ASC
"#;

pub const CLAIM_TASK_SLOT: &str = r#"
    UPDATE tasks
    SET submission_count = submission_count + 1
    WHERE id = $1 AND submission_count < completion_quota
"#;

pub fn insert_submission() -> String {
    format!(
        r#"
        INSERT INTO submissions (worker_id, task_id, option_id, amount, created_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (worker_id, task_id) DO NOTHING
        RETURNING {SUBMISSION_COLUMNS}
        "#
    )
}

pub const CREDIT_PENDING: &str = r#"
    UPDATE workers
    SET pending_amount = pending_amount + $2
    WHERE id = $1
"#;

pub const RESERVE_PENDING: &str = r#"
    UPDATE workers
    SET pending_amount = pending_amount - $2,
        locked_amount = locked_amount + $2
    WHERE id = $1 AND pending_amount >= $2
"#;

pub const RELEASE_LOCKED: &str = r#"
    UPDATE workers
    SET pending_amount = pending_amount + $2,
        locked_amount = locked_amount - $2
    WHERE id = $1 AND locked_amount >= $2
"#;

pub fn insert_payout() -> String {
    format!(
        r#"
        INSERT INTO payouts (worker_id, amount, status, signature, created_at)
        VALUES ($1, $2, 'Processing', NULL, $3)
        RETURNING {PAYOUT_COLUMNS}
        "#
    )
}

pub fn select_payout() -> String {
    format!("SELECT {PAYOUT_COLUMNS} FROM payouts WHERE id = $1")
}

pub fn select_payouts_by_status() -> String {
    format!("SELECT {PAYOUT_COLUMNS} FROM payouts WHERE status = $1 ORDER BY id ASC")
}

pub const FINISH_PAYOUT: &str = r#"
    UPDATE payouts
    SET status = $2, signature = $3
    WHERE id = $1 AND status = 'Processing'
"#;
