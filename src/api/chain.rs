use actix_web::{HttpResponse, Responder, get, post, web};
use log::{info, warn};

use super::models::{
    BroadcastBlockRequest, MessageResponse, MineResponse, ValidateResponse, WalletStatusResponse,
};
use crate::blockchain::LedgerError;
use crate::node::{Node, NodeError};

/// Get the full blockchain.
#[get("/chain/")]
pub async fn get_chain(node: web::Data<Node>) -> impl Responder {
    HttpResponse::Ok().json(node.chain())
}

/// Validate the whole chain and the open transactions.
#[get("/validate/")]
pub async fn validate_chain(node: web::Data<Node>) -> impl Responder {
    let (valid_chain, valid_transactions) = node.verify();
    HttpResponse::Ok().json(ValidateResponse {
        valid_chain,
        valid_transactions,
        length: node.height(),
    })
}

/// Mine the open transactions into a new block and gossip it.
#[post("/mine/")]
pub async fn mine_block(node: web::Data<Node>) -> impl Responder {
    match node.mine_block().await {
        Ok(block) => {
            info!("POST /mine/ - sealed block #{} (proof={})", block.index, block.proof);
            HttpResponse::Created().json(MineResponse {
                message: "Block added successfully.".into(),
                block,
                funds: node.get_balance(None),
            })
        }
        Err(
            e @ (NodeError::MiningInProgress
            | NodeError::Interrupted
            | NodeError::Ledger(LedgerError::StaleJob)),
        ) => {
            warn!("POST /mine/ - {e}");
            HttpResponse::Conflict().json(MessageResponse::new(e.to_string()))
        }
        Err(e) => {
            warn!("POST /mine/ - {e}");
            HttpResponse::InternalServerError().json(WalletStatusResponse {
                message: "Adding a block failed.".into(),
                wallet_set_up: !e.is_no_wallet(),
            })
        }
    }
}

/// Append a block mined by a peer.
#[post("/broadcast-block/")]
pub async fn broadcast_block(
    node: web::Data<Node>,
    body: web::Json<BroadcastBlockRequest>,
) -> impl Responder {
    let Some(block) = body.into_inner().block else {
        return HttpResponse::BadRequest().json(MessageResponse::new("No block attached."));
    };

    if block.index <= node.tip_index() {
        return HttpResponse::Conflict().json(MessageResponse::new(
            "Blockchain seems to be shorter, block not added.",
        ));
    }

    let index = block.index;
    match node.receive_block(block) {
        Ok(()) => {
            info!("POST /broadcast-block/ - block #{index} added");
            HttpResponse::Created().json(MessageResponse::new("Block added."))
        }
        Err(e) => {
            warn!("POST /broadcast-block/ - block #{index} refused: {e}");
            HttpResponse::InternalServerError().json(MessageResponse::new("Block seems invalid."))
        }
    }
}
