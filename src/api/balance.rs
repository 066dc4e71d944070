use actix_web::{HttpResponse, Responder, get, web};

use super::models::{BalanceQuery, BalanceResponse, WalletStatusResponse};
use crate::node::Node;

/// Balance of `?participant=`, or of this node's wallet when omitted.
#[get("/balance/")]
pub async fn get_balance(node: web::Data<Node>, query: web::Query<BalanceQuery>) -> impl Responder {
    match node.get_balance(query.participant.as_deref()) {
        Some(funds) => HttpResponse::Ok().json(BalanceResponse {
            message: "Fetched balance successfully.".into(),
            funds,
        }),
        None => HttpResponse::Ok().json(WalletStatusResponse {
            message: "Loading balance failed.".into(),
            wallet_set_up: false,
        }),
    }
}
