use qmenu_rs::auth::AuthPayload;
use serde_json::json;

mod common;
use common::*;

#[tokio::test]
async fn test_health_endpoints() {
    let env = TestEnvironment::new().await;

    let (status, body) = read(env.get("/", None).await).await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Server Up");

    let (status, body) = read(env.get("/health/status", None).await).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_register_then_login_round_trip() {
    let env = TestEnvironment::new().await;

    let response = env
        .post("/register", None, &registration("casa-pepe"))
        .await;
    let (status, registered) = read(response).await;
    assert_eq!(status, 201);

    let (status, body) = read(
        env.post(
            "/login",
            None,
            &json!({ "email": "CASA-PEPE@example.com", "password": "secret1" }),
        )
        .await,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["restaurant"]["route"], "casa-pepe");
    assert!(body["restaurant"].get("password_hash").is_none());

    let token = body["token"].as_str().unwrap();
    let claims = env.tokens.validate(token).unwrap();
    assert_eq!(claims.route, "casa-pepe");
    assert_eq!(claims.name, "Restaurant casa-pepe");

    let registered_claims = env
        .tokens
        .validate(registered["token"].as_str().unwrap())
        .unwrap();
    assert_eq!(claims.sub, registered_claims.sub);

    let (status, identity) = read(env.get("/route", Some(token)).await).await;
    assert_eq!(status, 200);
    assert_eq!(identity["route"], "casa-pepe");
    assert_eq!(identity["id"], claims.sub.as_str());
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let env = TestEnvironment::new().await;
    env.register("casa-pepe").await;

    let (status, body) = read(
        env.post("/register", None, &registration("casa-pepe"))
            .await,
    )
    .await;
    assert_eq!(status, 409);
    assert_eq!(body["status"], 409);

    let mut same_email = registration("other-route");
    same_email["email"] = json!("casa-pepe@example.com");
    let (status, _) = read(env.post("/register", None, &same_email).await).await;
    assert_eq!(status, 409);
}

#[tokio::test]
async fn test_reserved_route_rejected() {
    let env = TestEnvironment::new().await;

    let (status, _) = read(env.post("/register", None, &registration("table")).await).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_login_failures_share_one_message() {
    let env = TestEnvironment::new().await;
    env.register("casa-pepe").await;

    let (status, wrong_password) = read(
        env.post(
            "/login",
            None,
            &json!({ "email": "casa-pepe@example.com", "password": "nope-nope" }),
        )
        .await,
    )
    .await;
    assert_eq!(status, 401);

    let (status, unknown_email) = read(
        env.post(
            "/login",
            None,
            &json!({ "email": "ghost@example.com", "password": "secret1" }),
        )
        .await,
    )
    .await;
    assert_eq!(status, 401);

    assert_eq!(wrong_password["message"], "Email or Password invalid");
    assert_eq!(wrong_password["message"], unknown_email["message"]);
}

#[tokio::test]
async fn test_token_failures() {
    let env = TestEnvironment::new().await;

    let (status, body) = read(env.get("/table", None).await).await;
    assert_eq!(status, 401);
    assert_eq!(body["message"], "No token provided");

    let expired = env
        .tokens
        .issue_with_ttl(
            &AuthPayload {
                id: "r-1".to_string(),
                name: "Old".to_string(),
                route: "old".to_string(),
            },
            chrono::Duration::hours(-9),
        )
        .unwrap();
    let (status, body) = read(env.get("/table", Some(&expired)).await).await;
    assert_eq!(status, 401);
    assert_eq!(body["message"], "Token expired");

    // Signature of one token over the claims of another
    let valid = env.register("casa-pepe").await;
    let forged = env
        .tokens
        .issue(&AuthPayload {
            id: "r-2".to_string(),
            name: "Forged".to_string(),
            route: "forged".to_string(),
        })
        .unwrap();
    let valid_parts: Vec<&str> = valid.split('.').collect();
    let forged_parts: Vec<&str> = forged.split('.').collect();
    let tampered = format!(
        "{}.{}.{}",
        valid_parts[0], forged_parts[1], valid_parts[2]
    );
    let (status, body) = read(env.get("/table", Some(&tampered)).await).await;
    assert_eq!(status, 401);
    assert_eq!(body["message"], "Invalid token");
}

#[tokio::test]
async fn test_table_lifecycle() {
    let env = TestEnvironment::new().await;
    let token = env.register("casa-pepe").await;

    let (status, body) = read(
        env.post(
            "/new-table",
            Some(&token),
            &json!({ "hash": "t1", "name": "Terrace" }),
        )
        .await,
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(body["message"], "New table created");

    for duplicate in [
        json!({ "hash": "t1", "name": "Other" }),
        json!({ "hash": "t2", "name": "Terrace" }),
    ] {
        let (status, body) = read(env.post("/new-table", Some(&token), &duplicate).await).await;
        assert_eq!(status, 409);
        assert_eq!(body["message"], "Table already exists");
    }

    // Uniqueness is scoped to one restaurant
    let other = env.register("la-otra").await;
    let (status, _) = read(
        env.post(
            "/new-table",
            Some(&other),
            &json!({ "hash": "t1", "name": "Terrace" }),
        )
        .await,
    )
    .await;
    assert_eq!(status, 201);

    let (status, body) = read(env.get("/table", Some(&token)).await).await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Table in the restaurant");
    assert_eq!(body["tables"].as_array().unwrap().len(), 1);

    let (_, by_name) = read(env.get("/table/Terrace", Some(&token)).await).await;
    assert_eq!(by_name["table"]["hash"], "t1");

    let (status, missing) = read(env.get("/table/nope", Some(&token)).await).await;
    assert_eq!(status, 200);
    assert_eq!(missing["message"], "Table not found");
    assert!(missing["table"].is_null());

    let (status, body) = read(env.delete("/casa-pepe/table/t1", &token).await).await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Table removed!");

    let (_, body) = read(env.delete("/casa-pepe/table/t1", &token).await).await;
    assert_eq!(body["message"], "This table does not exist!");
}

#[tokio::test]
async fn test_commands_are_prepended_and_cleared() {
    let env = TestEnvironment::new().await;
    let token = env.register("casa-pepe").await;
    env.post(
        "/new-table",
        Some(&token),
        &json!({ "hash": "t1", "name": "Terrace" }),
    )
    .await;

    let (status, _) = read(
        env.post(
            "/casa-pepe/t1",
            None,
            &json!({ "command": [{ "id": "A", "qtd": 1 }] }),
        )
        .await,
    )
    .await;
    assert_eq!(status, 201);
    let (status, _) = read(
        env.post(
            "/casa-pepe/t1",
            None,
            &json!({ "command": [{ "_id": "B", "qtd": 3 }] }),
        )
        .await,
    )
    .await;
    assert_eq!(status, 201);

    let (_, body) = read(env.get("/table/t1", Some(&token)).await).await;
    let commands = body["table"]["commands"].as_array().unwrap();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0]["command"][0]["id"], "B");
    assert_eq!(commands[1]["command"][0]["id"], "A");

    let (status, body) = read(env.delete("/table/t1", &token).await).await;
    assert_eq!(status, 201);
    assert_eq!(body["message"], "Table clear");

    let (_, body) = read(env.get("/table/t1", Some(&token)).await).await;
    assert!(body["table"]["commands"].as_array().unwrap().is_empty());

    // Clearing an unknown table is acknowledged the same way
    let (status, _) = read(env.delete("/table/ghost", &token).await).await;
    assert_eq!(status, 201);
}

#[tokio::test]
async fn test_invalid_commands_leave_table_untouched() {
    let env = TestEnvironment::new().await;
    let token = env.register("casa-pepe").await;
    env.post(
        "/new-table",
        Some(&token),
        &json!({ "hash": "t1", "name": "Terrace" }),
    )
    .await;

    for command in [
        json!({ "command": [{ "qtd": 1 }] }),
        json!({ "command": [{ "id": "A", "qtd": 0 }] }),
        json!({ "command": [{ "id": "A", "qtd": -2 }] }),
        json!({ "command": [] }),
    ] {
        let (status, body) = read(env.post("/casa-pepe/t1", None, &command).await).await;
        assert_eq!(status, 400);
        assert_eq!(body["message"], "Command invalid");
    }

    let (status, body) = read(
        env.post(
            "/casa-pepe/zz",
            None,
            &json!({ "command": [{ "id": "A", "qtd": 1 }] }),
        )
        .await,
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(body["message"], "Table not found");

    let (status, body) = read(
        env.post(
            "/ghost/t1",
            None,
            &json!({ "command": [{ "id": "A", "qtd": 1 }] }),
        )
        .await,
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(body["message"], "Restaurant not found!");

    let (_, body) = read(env.get("/table/t1", Some(&token)).await).await;
    assert!(body["table"]["commands"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_menu_lifecycle() {
    let env = TestEnvironment::new().await;
    let token = env.register("casa-pepe").await;

    let (status, body) = read(
        env.post(
            "/add-to-menu",
            Some(&token),
            &menu_item("m1", "Paella", 12.5),
        )
        .await,
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(body["message"], "Item add to Menu");

    let (status, body) = read(
        env.post(
            "/add-to-menu",
            Some(&token),
            &menu_item("m1", "Paella again", 10.0),
        )
        .await,
    )
    .await;
    assert_eq!(status, 409);
    assert_eq!(body["message"], "The item already exists.");

    let edit = json!({ "ingredients": "rice", "name": "Paella Valenciana", "pic": "p.png", "price": 14.0 });
    let (status, body) = read(env.put("/casa-pepe/menu/m1", &token, &edit).await).await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Item updated!");

    let (_, body) = read(env.put("/casa-pepe/menu/m1", &token, &edit).await).await;
    assert_eq!(body["message"], "This item is already updated!");

    let (status, body) = read(
        env.put(
            "/casa-pepe/menu/m1",
            &token,
            &json!({ "name": "Paella" }),
        )
        .await,
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(
        body["message"],
        "Field: ingredients, name, pic, price are required"
    );

    let (status, body) = read(env.get("/casa-pepe/menu", None).await).await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Menu from Restaurant casa-pepe");
    assert_eq!(body["menu"][0]["name"], "Paella Valenciana");
    assert_eq!(body["menu"][0]["price"], 14.0);

    let (status, body) = read(env.delete("/casa-pepe/menu/m1", &token).await).await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Item removed!");

    let (status, body) = read(env.delete("/casa-pepe/menu/m1", &token).await).await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "This item does not exist!");
}

#[tokio::test]
async fn test_update_menu_replaces_everything() {
    let env = TestEnvironment::new().await;
    let token = env.register("casa-pepe").await;

    let first = json!({ "menu": [menu_item("x", "X", 1.0), menu_item("y", "Y", 2.0)] });
    let (status, body) = read(env.post("/new-menu", Some(&token), &first).await).await;
    assert_eq!(status, 201);
    assert_eq!(body["message"], "Menu updated");

    let second = json!({ "menu": [menu_item("z", "Z", 3.0)] });
    env.post("/new-menu", Some(&token), &second).await;

    let (_, body) = read(env.get("/casa-pepe/menu", None).await).await;
    let menu = body["menu"].as_array().unwrap();
    assert_eq!(menu.len(), 1);
    assert_eq!(menu[0]["id"], "z");
}

#[tokio::test]
async fn test_ownership_is_checked_against_token_route() {
    let env = TestEnvironment::new().await;
    let owner = env.register("casa-pepe").await;
    let intruder = env.register("la-otra").await;
    env.post(
        "/add-to-menu",
        Some(&owner),
        &menu_item("m1", "Paella", 12.5),
    )
    .await;

    let edit = json!({ "ingredients": "rice", "name": "Stolen", "pic": "p.png", "price": 1.0 });
    let (status, body) = read(env.put("/casa-pepe/menu/m1", &intruder, &edit).await).await;
    assert_eq!(status, 409);
    assert_eq!(body["message"], "Route not match");

    // Mismatch wins even when the target does not exist
    let (status, body) = read(env.delete("/casa-pepe/menu/ghost", &intruder).await).await;
    assert_eq!(status, 409);
    assert_eq!(body["message"], "Route not match");

    let (status, body) = read(env.delete("/casa-pepe/table/t1", &intruder).await).await;
    assert_eq!(status, 409);
    assert_eq!(body["message"], "Table can not be deleted");

    let (_, body) = read(env.get("/casa-pepe/menu", None).await).await;
    assert_eq!(body["menu"][0]["name"], "Paella");
}

#[tokio::test]
async fn test_unknown_menu_and_unmatched_routes() {
    let env = TestEnvironment::new().await;

    let (status, body) = read(env.get("/ghost/menu", None).await).await;
    assert_eq!(status, 404);
    assert_eq!(body["message"], "Restaurant not found!");

    let (status, _) = read(env.get("/a/b/c/d", None).await).await;
    assert_eq!(status, 501);

    // Known paths with an unsupported method share the same answer
    let (status, body) = read(env.get("/login", None).await).await;
    assert_eq!(status, 501);
    assert_eq!(body["message"], "Not Implemented");
    assert_eq!(body["status"], 501);

    // No token needed to learn that a protected path lacks the method
    let (status, body) = read(env.post("/table/abc", None, &json!({})).await).await;
    assert_eq!(status, 501);
    assert_eq!(body["message"], "Not Implemented");
}

#[tokio::test]
async fn test_table_hash_cannot_shadow_fixed_segments() {
    let env = TestEnvironment::new().await;
    let token = env.register("casa-pepe").await;

    for hash in ["menu", "table"] {
        let (status, body) = read(
            env.post(
                "/new-table",
                Some(&token),
                &json!({ "hash": hash, "name": format!("Table {}", hash) }),
            )
            .await,
        )
        .await;
        assert_eq!(status, 400, "hash {} was accepted", hash);
        assert_eq!(body["status"], 400);
    }

    let (_, body) = read(env.get("/table", Some(&token)).await).await;
    assert_eq!(body["tables"], json!([]));
}

#[tokio::test]
async fn test_metrics_endpoint_reports_traffic() {
    let env = TestEnvironment::new().await;
    env.get("/ghost/menu", None).await;

    let response = env.get("/metrics", None).await;
    assert_eq!(response.status().as_u16(), 200);
    let text = response.text().await.unwrap();

    assert!(text.contains("http_requests_total"));
    assert!(text.contains(r#"endpoint="/:route/menu""#));
    assert!(text.contains("database_operations_total"));
}
