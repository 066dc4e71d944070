use std::io;

use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::{info, warn};

use rust_ledger_node::api;
use rust_ledger_node::blockchain::Ledger;
use rust_ledger_node::config::Config;
use rust_ledger_node::network::PeerClient;
use rust_ledger_node::node::Node;
use rust_ledger_node::storage::SnapshotFile;
use rust_ledger_node::wallet::Wallet;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let _ = dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = Config::from_env();

    // A snapshot we cannot read means we would run on inconsistent state.
    let snapshot = cfg.snapshot_path();
    let ledger = Ledger::open(SnapshotFile::new(snapshot.clone())).map_err(|e| {
        io::Error::other(format!("cannot load {}: {e}", snapshot.display()))
    })?;

    let mut wallet = Wallet::new(cfg.wallet_path());
    match wallet.load_keys() {
        Ok(true) => info!("wallet loaded from {}", wallet.path().display()),
        Ok(false) => info!("no wallet yet, POST /api/v1/wallet/ to create one"),
        Err(e) => warn!("wallet at {} not usable: {e}", wallet.path().display()),
    }

    let peers = PeerClient::new(cfg.peer_timeout).map_err(io::Error::other)?;
    let node = web::Data::new(Node::new(ledger, wallet, peers));

    println!("⛓️ Starting ledger node at http://{}:{}", cfg.host, cfg.port);

    HttpServer::new(move || {
        App::new()
            .app_data(node.clone())
            .configure(api::init_routes)
    })
    .bind((cfg.host.as_str(), cfg.port))?
    .run()
    .await
}
