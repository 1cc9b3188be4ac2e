use once_cell::sync::Lazy;
use reqwest::Client;

const USER_AGENT: &str = concat!("cinematch/", env!("CARGO_PKG_VERSION"));

// No request timeout: upstream calls run to completion or transport failure.
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .expect("Failed to build HTTP client")
});

pub fn get_http_client() -> &'static Client {
    &HTTP_CLIENT
}
