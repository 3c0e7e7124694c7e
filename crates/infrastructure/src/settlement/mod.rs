pub mod rpc_settlement_network;

pub use rpc_settlement_network::RpcSettlementNetwork;
