use derive_more::{Display, Error, From};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

/// The session token minted at sign-in by the auth layer. `sub` is the
/// user id every story and chapter row is scoped to.
#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[allow(dead_code)]
    exp: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Display, From, Error)]
pub enum Error {
    #[display(fmt = "No bearer token provided.")]
    MissingToken,
    #[display(fmt = "Token rejected: {}", "_0")]
    InvalidToken(jsonwebtoken::errors::Error),
}

#[derive(Clone)]
pub struct SessionVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl SessionVerifier {
    pub fn new(secret: &str) -> SessionVerifier {
        SessionVerifier {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Authenticates an `Authorization` header value. Handlers call this
    /// before touching anything else; failures map to 401.
    pub fn session(&self, authorization: Option<&str>) -> Result<Session, Error> {
        let header = authorization.ok_or(Error::MissingToken)?;
        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or(Error::MissingToken)?;
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(Session {
            user_id: data.claims.sub,
            email: data.claims.email,
            name: data.claims.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims<'a> {
        sub: &'a str,
        email: Option<&'a str>,
        name: Option<&'a str>,
        exp: usize,
    }

    fn token(secret: &str, sub: &str) -> String {
        encode(
            &Header::default(),
            &TestClaims {
                sub,
                email: Some("reader@example.com"),
                name: Some("A Reader"),
                exp: 4102444800, // far future
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn decodes_a_valid_bearer_token() {
        let verifier = SessionVerifier::new("test-secret");
        let header = format!("Bearer {}", token("test-secret", "user-1"));
        let session = verifier.session(Some(&header)).unwrap();
        assert_eq!(session.user_id, "user-1");
        assert_eq!(session.email.as_deref(), Some("reader@example.com"));
    }

    #[test]
    fn missing_header_is_rejected() {
        let verifier = SessionVerifier::new("test-secret");
        assert!(matches!(verifier.session(None), Err(Error::MissingToken)));
    }

    #[test]
    fn non_bearer_header_is_rejected() {
        let verifier = SessionVerifier::new("test-secret");
        assert!(matches!(
            verifier.session(Some("Basic dXNlcjpwdw==")),
            Err(Error::MissingToken)
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let verifier = SessionVerifier::new("test-secret");
        let header = format!("Bearer {}", token("other-secret", "user-1"));
        assert!(matches!(
            verifier.session(Some(&header)),
            Err(Error::InvalidToken(_))
        ));
    }
}
