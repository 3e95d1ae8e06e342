use axum::Router;

/// Serve a stub vendor app on an ephemeral port; returns its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve stub");
    });
    format!("http://{addr}")
}

/// A base URL nothing listens on, for exercising the unreachable row.
pub fn unreachable_base() -> String {
    "http://127.0.0.1:9".to_string()
}
