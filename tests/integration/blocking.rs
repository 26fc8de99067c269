use reprise::{
    BlockingReqwestTransport, Method, Request, RetryPolicy, RetryingTransport, StatusCode,
};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test(flavor = "multi_thread")]
async fn blocking_transport_retries() {
    let _ = env_logger::try_init();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/hello", server.uri());
    let response = tokio::task::spawn_blocking(move || {
        let transport = RetryingTransport::new(RetryPolicy::default())
            .with_transport(BlockingReqwestTransport::new());
        let req = Request::builder(Method::GET, url).build().unwrap();
        transport.send(&req)
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text(), "ok");
    assert_eq!(response.url().map(|u| u.path()), Some("/hello"));
}
