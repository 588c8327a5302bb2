//! Authentication for the directory API.

use reqwest::RequestBuilder;

/// Credential scheme accepted by the directory.
#[derive(Debug, Clone)]
pub enum DirectoryAuth {
    /// `Authorization: Token <value>` — the directory's native scheme.
    Token(String),
    /// `Authorization: Bearer <value>`.
    Bearer(String),
}

impl DirectoryAuth {
    /// Build a token credential.
    #[must_use]
    pub fn token(value: impl Into<String>) -> Self {
        DirectoryAuth::Token(value.into())
    }

    /// Attach the `Authorization` header to a request.
    pub fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            DirectoryAuth::Token(t) => builder.header("Authorization", format!("Token {t}")),
            DirectoryAuth::Bearer(t) => builder.bearer_auth(t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_header_format() {
        let auth = DirectoryAuth::token("abc123");
        let client = reqwest::Client::new();
        let request = auth
            .apply(client.get("http://localhost/students/"))
            .build()
            .unwrap();
        assert_eq!(
            request.headers().get("Authorization").unwrap(),
            "Token abc123"
        );
    }
}
