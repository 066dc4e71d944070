use actix_web::{HttpResponse, Responder, delete, get, post, web};
use log::error;

use super::models::{AddNodeRequest, MessageResponse, NodesResponse};
use crate::node::Node;

#[post("/node/")]
pub async fn add_node(node: web::Data<Node>, body: web::Json<AddNodeRequest>) -> impl Responder {
    let peer = body.node.trim();
    if peer.is_empty() {
        return HttpResponse::BadRequest().json(MessageResponse::new("No data attached."));
    }

    match node.add_peer(peer) {
        Ok(all_nodes) => HttpResponse::Created().json(NodesResponse {
            message: Some("Node added successfully.".into()),
            all_nodes,
        }),
        Err(e) => {
            error!("POST /node/ - {e}");
            HttpResponse::InternalServerError()
                .json(MessageResponse::new("Adding the node failed."))
        }
    }
}

#[delete("/node/{node_url}/")]
pub async fn remove_node(node: web::Data<Node>, path: web::Path<(String,)>) -> impl Responder {
    let peer = path.into_inner().0;
    if peer.trim().is_empty() {
        return HttpResponse::BadRequest().json(MessageResponse::new("No node URL found."));
    }

    match node.remove_peer(&peer) {
        Ok(all_nodes) => HttpResponse::Ok().json(NodesResponse {
            message: Some("Node removed successfully.".into()),
            all_nodes,
        }),
        Err(e) => {
            error!("DELETE /node/{peer}/ - {e}");
            HttpResponse::InternalServerError()
                .json(MessageResponse::new("Removing the node failed."))
        }
    }
}

#[get("/nodes/")]
pub async fn get_nodes(node: web::Data<Node>) -> impl Responder {
    HttpResponse::Ok().json(NodesResponse {
        message: None,
        all_nodes: node.peers(),
    })
}

#[cfg(test)]
mod tests {
    use actix_web::{App, http::StatusCode, test};
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::api::{init_routes, test_support::node_data};

    #[actix_web::test]
    async fn add_list_remove() {
        let dir = TempDir::new().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(node_data(&dir, 5000))
                .configure(init_routes),
        )
        .await;

        for peer in ["localhost:5001", "localhost:5002"] {
            let req = test::TestRequest::post()
                .uri("/api/v1/node/")
                .set_json(json!({ "node": peer }))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
        }

        let req = test::TestRequest::delete()
            .uri("/api/v1/node/localhost:5001/")
            .to_request();
        let body: NodesResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.all_nodes, vec!["localhost:5002".to_string()]);

        let req = test::TestRequest::get().uri("/api/v1/nodes/").to_request();
        let body: NodesResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.all_nodes, vec!["localhost:5002".to_string()]);
    }

    #[actix_web::test]
    async fn empty_node_is_rejected() {
        let dir = TempDir::new().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(node_data(&dir, 5000))
                .configure(init_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/node/")
            .set_json(json!({ "node": "" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }
}
