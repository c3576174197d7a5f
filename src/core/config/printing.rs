use crate::core::config::data::Config;

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        let show = |key: &str, value: &Option<String>| match value {
            Some(value) => println!("  {key}: {value}"),
            None => println!("  {key}: (unset)"),
        };
        show("base-url", &self.base_url);
        show("catalog-url", &self.catalog_url);
        match &self.access_token {
            Some(_) => println!("  access-token: (set)"),
            None => println!("  access-token: (unset)"),
        }
        show("default-flow", &self.default_flow);
        match self.stream.unwrap_or(true) {
            true => println!("  stream: on"),
            false => println!("  stream: off"),
        }
        match self.request_timeout_secs {
            Some(secs) => println!("  request-timeout: {secs}s"),
            None => println!("  request-timeout: (default)"),
        }
        match self.frame_interval_ms {
            Some(ms) => println!("  frame-interval: {ms}ms"),
            None => println!("  frame-interval: (default)"),
        }
    }
}
