mod common;

#[tokio::test]
async fn dashboard_returns_404_when_no_credential_is_configured() {
    let gateway = common::start().await;
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/_tunnelgate/inspect", gateway.base_url()))
        .header(reqwest::header::HOST, "unconfigured.example")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn dashboard_rejects_a_wrong_token_and_accepts_the_right_one_via_query() {
    let gateway = common::start().await;
    gateway
        .state
        .credential_store
        .upsert("dash.example", "correct-horse")
        .await
        .unwrap();

    let client = reqwest::Client::new();
    let wrong = client
        .get(format!("{}/_tunnelgate/inspect?token=nope", gateway.base_url()))
        .header(reqwest::header::HOST, "dash.example")
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), 401);

    let right = client
        .get(format!(
            "{}/_tunnelgate/inspect?token=correct-horse",
            gateway.base_url()
        ))
        .header(reqwest::header::HOST, "dash.example")
        .send()
        .await
        .unwrap();
    assert_eq!(right.status(), 200);
    let body = right.text().await.unwrap();
    assert!(body.contains("dash.example"));
}

#[tokio::test]
async fn a_request_cannot_view_or_prune_a_different_hosts_logs_via_the_token_alone() {
    let gateway = common::start().await;
    gateway
        .state
        .credential_store
        .upsert("victim.example", "victims-token")
        .await
        .unwrap();

    // Even with the victim's own token, a request arriving on a different
    // Host cannot be scoped onto the victim's hostname: there is no field
    // left to smuggle a different hostname through.
    let client = reqwest::Client::new();
    let response = client
        .get(format!(
            "{}/_tunnelgate/inspect?token=victims-token",
            gateway.base_url()
        ))
        .header(reqwest::header::HOST, "attacker.example")
        .send()
        .await
        .unwrap();
    // attacker.example has no credential configured of its own.
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn dashboard_prune_accepts_a_bearer_token_and_renders_a_flash_result() {
    let gateway = common::start().await;
    gateway
        .state
        .credential_store
        .upsert("prune.example", "prune-token")
        .await
        .unwrap();

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/_tunnelgate/inspect", gateway.base_url()))
        .header(reqwest::header::HOST, "prune.example")
        .bearer_auth("prune-token")
        .form(&[("action", "prune")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("Pruned 0 logged exchange(s)"));
}

#[tokio::test]
async fn dashboard_post_accepts_a_query_token_when_no_form_token_is_present() {
    let gateway = common::start().await;
    gateway
        .state
        .credential_store
        .upsert("query-token.example", "q-token")
        .await
        .unwrap();

    let client = reqwest::Client::new();
    let response = client
        .post(format!(
            "{}/_tunnelgate/inspect?token=q-token",
            gateway.base_url()
        ))
        .header(reqwest::header::HOST, "query-token.example")
        .form(&[("action", "prune")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}
