pub mod http;
pub mod logging;
#[cfg(test)]
pub mod test_support;
pub mod timing;
