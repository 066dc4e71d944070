mod balance;
mod chain;
mod health;
pub mod models;
mod nodes;
mod tx;
mod wallet;

use actix_web::web::{self, ServiceConfig};

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(wallet::create_wallet)
            .service(wallet::load_wallet)
            .service(balance::get_balance)
            .service(tx::post_transaction)
            .service(tx::get_transactions)
            .service(tx::broadcast_transaction)
            .service(chain::mine_block)
            .service(chain::get_chain)
            .service(chain::validate_chain)
            .service(chain::broadcast_block)
            .service(nodes::add_node)
            .service(nodes::remove_node)
            .service(nodes::get_nodes),
    );
}
