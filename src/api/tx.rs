use actix_web::{HttpResponse, Responder, get, post, web};
use log::{info, warn};

use super::models::{MessageResponse, NewTxRequest, NewTxResponse};
use crate::node::Node;
use crate::transaction::Transaction;

/// Sign a transfer with this node's wallet, pool it and gossip it to peers.
#[post("/transaction/")]
pub async fn post_transaction(
    node: web::Data<Node>,
    body: web::Json<NewTxRequest>,
) -> impl Responder {
    if node.public_key().is_none() {
        return HttpResponse::BadRequest().json(MessageResponse::new("No wallet set up."));
    }
    if body.recipient.trim().is_empty() || body.amount == 0.0 {
        return HttpResponse::BadRequest().json(MessageResponse::new("Required data is missing."));
    }

    match node.submit_transaction(&body.recipient, body.amount).await {
        Ok(transaction) => {
            info!("POST /transaction/ - {} to {} accepted", body.amount, body.recipient);
            HttpResponse::Created().json(NewTxResponse {
                message: "Successfully added transaction.".into(),
                transaction,
                funds: node.get_balance(None),
            })
        }
        Err(e) => {
            warn!("POST /transaction/ - {e}");
            HttpResponse::InternalServerError()
                .json(MessageResponse::new("Creating a transaction failed."))
        }
    }
}

/// Open transactions, in admission order.
#[get("/transactions/")]
pub async fn get_transactions(node: web::Data<Node>) -> impl Responder {
    HttpResponse::Ok().json(node.open_transactions())
}

/// Admit a transaction gossiped by a peer.
#[post("/broadcast-transaction/")]
pub async fn broadcast_transaction(
    node: web::Data<Node>,
    body: web::Json<Transaction>,
) -> impl Responder {
    let tx = body.into_inner();
    if tx.sender.is_empty()
        || tx.recipient.is_empty()
        || tx.amount == 0.0
        || tx.signature.is_empty()
    {
        return HttpResponse::BadRequest().json(MessageResponse::new("Some tx is missing."));
    }

    match node.receive_transaction(&tx.recipient, &tx.sender, &tx.signature, tx.amount) {
        Ok(transaction) => HttpResponse::Created().json(NewTxResponse {
            message: "Successfully added transaction.".into(),
            transaction,
            funds: None,
        }),
        Err(e) => {
            warn!("POST /broadcast-transaction/ - {e}");
            HttpResponse::InternalServerError()
                .json(MessageResponse::new("Creating a transaction failed."))
        }
    }
}
