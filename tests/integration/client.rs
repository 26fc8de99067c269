use crate::utils::{NameGreeting, RecordingSleeper};
use reprise::{Client, FailureKind, ReqwestTransport, RetryPolicy, RetryingTransport, StatusCode};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request as MockRequest, ResponseTemplate};

#[tokio::test]
async fn retries_until_success() {
    let _ = env_logger::try_init();
    let server = MockServer::start().await;
    let client = Client::new(&server.uri());

    Mock::given(method("GET"))
        .and(path("/hello"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hello"))
        .and(query_param("name", "world"))
        .respond_with(|req: &MockRequest| {
            let name = req
                .url
                .query_pairs()
                .find(|(k, _)| k == "name")
                .map(|(_, v)| v)
                .unwrap();
            let body = NameGreeting {
                message: format!("Hello, {}!", name),
            };
            ResponseTemplate::new(200).set_body_json(body)
        })
        .expect(1)
        .mount(&server)
        .await;

    let req = client.get("/hello").query(&[("name", "world")]).build().unwrap();
    let response = client.send(&req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.json::<NameGreeting>().unwrap(),
        NameGreeting {
            message: "Hello, world!".into(),
        }
    );
}

#[tokio::test]
async fn honors_retry_after() {
    let server = MockServer::start().await;
    let sleeper = RecordingSleeper::default();
    let transport = RetryingTransport::new(RetryPolicy::default())
        .with_async_transport(ReqwestTransport::new())
        .with_sleeper(sleeper.clone());
    let client = Client::with_transport(&server.uri(), transport);

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let response = client.send(&client.get("/hello").build().unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(sleeper.waits(), vec![Duration::from_secs(3)]);
}

#[tokio::test]
async fn final_response_returned_when_exhausted() {
    let server = MockServer::start().await;
    let policy = RetryPolicy::builder().max_attempts(2).build().unwrap();
    let client = Client::with_policy(&server.uri(), policy);

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(3)
        .mount(&server)
        .await;

    let response = client.send(&client.get("hello").build().unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.text(), "bad gateway");
}

#[tokio::test]
async fn response_reports_url_after_redirect() {
    let server = MockServer::start().await;
    let client = Client::new(&server.uri());

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let response = client.send(&client.get("/old").build().unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let url = response.url().unwrap();
    assert_eq!(url.as_str(), format!("{}/new", server.uri()));
}

#[tokio::test]
async fn non_retryable_status_passes_through() {
    let server = MockServer::start().await;
    let client = Client::new(&server.uri());

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let response = client.send(&client.get("/missing").build().unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn connection_refused_is_retried_then_raised() {
    let policy = RetryPolicy::builder().max_attempts(2).build().unwrap();
    let client = Client::with_policy("http://127.0.0.1:1", policy);

    let err = client
        .send(&client.get("/hello").build().unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.as_transport().unwrap().kind(), FailureKind::Connect);
}
