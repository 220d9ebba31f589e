use thiserror::Error;

/// Taille maximale du corps de réponse conservé dans une erreur.
pub const MAX_ERROR_BODY: usize = 300;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} sur {url} : {body}")]
    Status { url: String, status: u16, body: String },

    #[error("erreur réseau : {0}")]
    Network(String),

    #[error("échec après {attempts} tentatives : {last}")]
    RetriesExhausted { attempts: u32, last: Box<FetchError> },

    #[error("réponse JSON invalide : {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    /// 429, 5xx et erreurs réseau sont retentés ; le reste échoue immédiatement.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => is_transient_status(*status),
            FetchError::Network(_) => true,
            FetchError::RetriesExhausted { .. } | FetchError::Decode(_) => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}

pub fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

pub fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}
