//! Maps raw [`Fault`]s onto retry categories and operator-facing text.
//!
//! The mapping is a static table: adding a fault variant means adding an arm
//! here, and the compiler points at every place that needs updating.

use crate::error::{DestinationFault, Fault, SourceFault, TransportFault};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    TransientConnection,
    TransientTimeout,
    /// Malformed response, server error or rate limit.
    TransientService,
    PermanentAuth,
    PermanentNotFound,
    PermanentAccessDenied,
    Unknown,
}

impl Category {
    /// Default retry predicate: only the transient categories are retried.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Category::TransientConnection | Category::TransientTimeout | Category::TransientService
        )
    }
}

/// A classified fault: its category and a sentence for the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub description: String,
}

impl Classification {
    fn new(category: Category, description: impl Into<String>) -> Self {
        Self {
            category,
            description: description.into(),
        }
    }
}

const CONNECTION_UNAVAILABLE: &str = "Network connection is unavailable";
const NETWORK_TIMEOUT: &str = "Network timeout occurred";

/// Classify `fault`.  `subreddit` is only used to word the descriptions of
/// subreddit-level access failures.
pub fn classify(fault: &Fault, subreddit: &str) -> Classification {
    match fault {
        Fault::Transport(inner) => classify_transport(inner),
        Fault::Source(inner) => classify_source(inner, subreddit),
        Fault::Destination(inner) => classify_destination(inner),
        Fault::Image(msg) => Classification::new(Category::Unknown, msg.clone()),
    }
}

fn classify_transport(fault: &TransportFault) -> Classification {
    match fault {
        TransportFault::Connection(_) => {
            Classification::new(Category::TransientConnection, CONNECTION_UNAVAILABLE)
        }
        TransportFault::ConnectTimeout(_) | TransportFault::ReadTimeout(_) => {
            Classification::new(Category::TransientTimeout, NETWORK_TIMEOUT)
        }
        TransportFault::Other(msg) => Classification::new(Category::Unknown, msg.clone()),
    }
}

fn classify_source(fault: &SourceFault, subreddit: &str) -> Classification {
    match fault {
        // Unwrapped exactly one level.
        SourceFault::Request(inner) if inner.is_recognized() => classify_transport(inner),
        SourceFault::Request(inner) => Classification::new(Category::Unknown, inner.to_string()),
        SourceFault::BadJson | SourceFault::ServerError(_) | SourceFault::TooManyRequests => {
            Classification::new(Category::TransientService, "Reddit server error")
        }
        // Only the token endpoint reports a bare 401; API calls re-authenticate.
        SourceFault::Response(401) => Classification::new(
            Category::PermanentAuth,
            "Reddit authentication error: wrong client ID and/or client secret",
        ),
        SourceFault::Response(code) => {
            Classification::new(Category::Unknown, format!("Reddit returned HTTP {code}"))
        }
        SourceFault::OAuth(_) => Classification::new(
            Category::PermanentAuth,
            "Reddit authentication error: wrong username and/or password",
        ),
        SourceFault::TokenRejected => Classification::new(
            Category::PermanentAuth,
            "Reddit authentication error: the access token was rejected",
        ),
        SourceFault::Redirect => Classification::new(
            Category::PermanentNotFound,
            format!("The subreddit r/{subreddit} probably doesn't exist"),
        ),
        SourceFault::NotFound => Classification::new(
            Category::PermanentNotFound,
            format!("The subreddit r/{subreddit} is probably banned"),
        ),
        SourceFault::Forbidden => Classification::new(
            Category::PermanentAccessDenied,
            format!(
                "The subreddit r/{subreddit} is probably set to private \
                 (only approved members can access it)"
            ),
        ),
    }
}

fn classify_destination(fault: &DestinationFault) -> Classification {
    match fault {
        DestinationFault::Network(_) => {
            Classification::new(Category::TransientConnection, CONNECTION_UNAVAILABLE)
        }
        DestinationFault::InvokeTimeout => {
            Classification::new(Category::TransientTimeout, NETWORK_TIMEOUT)
        }
        DestinationFault::Status(code, _) if *code == 429 || (500..600).contains(code) => {
            Classification::new(Category::TransientService, "Bluesky server error")
        }
        DestinationFault::Unauthorized(msg) => {
            Classification::new(Category::PermanentAuth, format!("Bluesky login error: {msg}"))
        }
        DestinationFault::Status(..) | DestinationFault::BadResponse(_) => {
            Classification::new(Category::Unknown, fault.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(fault: impl Into<Fault>) -> Category {
        classify(&fault.into(), "PodcastSharing").category
    }

    #[test]
    fn transport_faults_are_transient() {
        assert_eq!(
            category(TransportFault::Connection("refused".into())),
            Category::TransientConnection
        );
        assert_eq!(
            category(TransportFault::ConnectTimeout("t".into())),
            Category::TransientTimeout
        );
        assert_eq!(category(TransportFault::ReadTimeout("t".into())), Category::TransientTimeout);
        assert_eq!(category(TransportFault::Other("tls".into())), Category::Unknown);
    }

    #[test]
    fn wrapped_request_fault_is_unwrapped_one_level() {
        let wrapped = SourceFault::Request(TransportFault::ReadTimeout("slow".into()));
        let c = classify(&wrapped.into(), "x");
        assert_eq!(c.category, Category::TransientTimeout);
        assert_eq!(c.description, "Network timeout occurred");

        let wrapped = SourceFault::Request(TransportFault::Connection("down".into()));
        assert_eq!(category(wrapped), Category::TransientConnection);
    }

    #[test]
    fn wrapped_unrecognized_fault_is_unknown_and_not_retryable() {
        let wrapped = SourceFault::Request(TransportFault::Other("invalid header".into()));
        let c = classify(&wrapped.into(), "x");
        assert_eq!(c.category, Category::Unknown);
        assert!(!c.category.is_retryable());
    }

    #[test]
    fn reddit_service_faults_are_transient() {
        for fault in [
            SourceFault::BadJson,
            SourceFault::ServerError(503),
            SourceFault::TooManyRequests,
        ] {
            let c = classify(&fault.into(), "x");
            assert_eq!(c.category, Category::TransientService);
            assert_eq!(c.description, "Reddit server error");
        }
    }

    #[test]
    fn reddit_permanent_faults_mention_the_subreddit() {
        let c = classify(&SourceFault::Redirect.into(), "PodcastSharing");
        assert_eq!(c.category, Category::PermanentNotFound);
        assert_eq!(c.description, "The subreddit r/PodcastSharing probably doesn't exist");

        let c = classify(&SourceFault::NotFound.into(), "PodcastSharing");
        assert_eq!(c.category, Category::PermanentNotFound);
        assert!(c.description.ends_with("is probably banned"));

        let c = classify(&SourceFault::Forbidden.into(), "PodcastSharing");
        assert_eq!(c.category, Category::PermanentAccessDenied);
        assert!(c.description.contains("private"));
    }

    #[test]
    fn reddit_auth_faults() {
        assert_eq!(category(SourceFault::Response(401)), Category::PermanentAuth);
        assert_eq!(category(SourceFault::Response(418)), Category::Unknown);
        assert_eq!(category(SourceFault::OAuth("invalid_grant".into())), Category::PermanentAuth);
        assert_eq!(category(SourceFault::TokenRejected), Category::PermanentAuth);
    }

    #[test]
    fn destination_faults() {
        assert_eq!(
            category(DestinationFault::Network("reset".into())),
            Category::TransientConnection
        );
        assert_eq!(category(DestinationFault::InvokeTimeout), Category::TransientTimeout);
        assert_eq!(
            category(DestinationFault::Status(502, String::new())),
            Category::TransientService
        );
        assert_eq!(
            category(DestinationFault::Status(429, String::new())),
            Category::TransientService
        );
        assert_eq!(
            category(DestinationFault::Status(400, "InvalidRecord".into())),
            Category::Unknown
        );

        let c = classify(&DestinationFault::Unauthorized("Invalid identifier or password".into()).into(), "x");
        assert_eq!(c.category, Category::PermanentAuth);
        assert_eq!(c.description, "Bluesky login error: Invalid identifier or password");
    }

    #[test]
    fn only_transient_categories_are_retryable() {
        assert!(Category::TransientConnection.is_retryable());
        assert!(Category::TransientTimeout.is_retryable());
        assert!(Category::TransientService.is_retryable());
        assert!(!Category::PermanentAuth.is_retryable());
        assert!(!Category::PermanentNotFound.is_retryable());
        assert!(!Category::PermanentAccessDenied.is_retryable());
        assert!(!Category::Unknown.is_retryable());
    }
}
