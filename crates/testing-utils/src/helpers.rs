//! Fixed wallet addresses and small helpers shared by tests.

use mechaworks_domain::WalletAddress;

pub const PLATFORM_WALLET: &str = "9isxjm1LY96pK8veLHYkHG72edjQ85A1qTbQjSFsfLC8";
pub const REQUESTER_WALLET: &str = "Borqy3dEjw9az7Uj9nW69A9ZDansFGHWEggUx7tkv44f";
pub const WORKER_WALLET: &str = "6anbDQNCcVh2f6okexjaX1VGj6tEnizJ1kV5UTBS8Zhi";
pub const OTHER_WORKER_WALLET: &str = "AUH6c4QLMr2qQr9N5Kkpz5astDM9gBNroXCSxQiFTGQv";
pub const STRANGER_WALLET: &str = "DYougPS3ao5Ticdy5bFcKKcXgSjHVJ2yuwaMgxHpPoQr";

/// Parses one of the fixed test addresses.
pub fn wallet(address: &str) -> WalletAddress {
    match address.parse() {
        Ok(wallet) => wallet,
        Err(e) => panic!("测试地址无效 {address}: {e}"),
    }
}
