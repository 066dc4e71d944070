use actix_web::{HttpResponse, Responder, get, post, web};
use log::{error, warn};

use super::models::{MessageResponse, WalletResponse};
use crate::node::{Node, WalletKeys};

fn wallet_response(node: &Node, keys: WalletKeys) -> WalletResponse {
    WalletResponse {
        public_key: keys.public_key,
        private_key: keys.private_key,
        funds: node.get_balance(None),
    }
}

/// Generate a new keypair, save it and make it this node's identity.
#[post("/wallet/")]
pub async fn create_wallet(node: web::Data<Node>) -> impl Responder {
    match node.create_wallet() {
        Ok(keys) => HttpResponse::Created().json(wallet_response(&node, keys)),
        Err(e) => {
            error!("POST /wallet/ - {e}");
            HttpResponse::InternalServerError()
                .json(MessageResponse::new("Saving the keys failed."))
        }
    }
}

/// Load the keypair saved for this node.
#[get("/wallet/")]
pub async fn load_wallet(node: web::Data<Node>) -> impl Responder {
    match node.load_wallet() {
        Ok(keys) => HttpResponse::Created().json(wallet_response(&node, keys)),
        Err(e) => {
            warn!("GET /wallet/ - {e}");
            HttpResponse::InternalServerError()
                .json(MessageResponse::new("Loading the keys failed."))
        }
    }
}
