pub const APP_NAME: &str = "pour-cost-gateway";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_TAG: Option<&str> = option_env!("GIT_TAG");

pub fn version_label() -> String {
    if let Some(tag) = GIT_TAG {
        tag.to_string()
    } else {
        format!("v{}", APP_VERSION)
    }
}

/// `User-Agent` sent to upstream APIs.
pub fn user_agent() -> String {
    format!("{}/{}", APP_NAME, version_label())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_names_the_gateway() {
        let agent = user_agent();
        assert!(agent.starts_with("pour-cost-gateway/"));
        assert!(agent.contains(&version_label()));
    }
}
