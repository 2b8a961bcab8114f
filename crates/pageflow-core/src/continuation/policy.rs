use super::types::{DataQuery, QueryRequest, QueryResponse};
use crate::config::DriverConfig;

/// Decides whether a sequence continues after a response.
///
/// Returning `None` or an empty list ends the sequence.
pub trait ContinuationPolicy: Send + Sync {
    fn next_queries(&self, request: &QueryRequest, response: &QueryResponse)
        -> Option<Vec<DataQuery>>;
}

impl<F> ContinuationPolicy for F
where
    F: Fn(&QueryRequest, &QueryResponse) -> Option<Vec<DataQuery>> + Send + Sync,
{
    fn next_queries(
        &self,
        request: &QueryRequest,
        response: &QueryResponse,
    ) -> Option<Vec<DataQuery>> {
        self(request, response)
    }
}

/// Continues every non-empty frame that carries a continuation token: the
/// originating target (looked up by ref id) is re-issued with the token set.
///
/// Tokens on zero-row frames are ignored, matching the merge which drops
/// such frames.
#[derive(Debug, Clone)]
pub struct TokenContinuation {
    key: String,
}

impl TokenContinuation {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn from_config(config: &DriverConfig) -> Self {
        Self::new(config.continuation_key.clone())
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl ContinuationPolicy for TokenContinuation {
    fn next_queries(
        &self,
        request: &QueryRequest,
        response: &QueryResponse,
    ) -> Option<Vec<DataQuery>> {
        let mut next = Vec::new();
        for frame in response.frames.iter().filter(|frame| !frame.is_empty()) {
            let Some(token) = frame.continuation_token(&self.key) else {
                continue;
            };
            let ref_id = frame.ref_id.as_deref().unwrap_or_default();
            match request.target(ref_id) {
                Some(target) => next.push(target.clone().with_continuation_token(token)),
                None => tracing::warn!(
                    request_id = %request.request_id,
                    ref_id,
                    "continuation token on frame with no matching target"
                ),
            }
        }
        (!next.is_empty()).then_some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pageflow_frames::{Field, FieldType, Frame};

    fn frame(ref_id: &str, rows: usize) -> Frame {
        Frame::new(ref_id).with_field(
            Field::new("value", FieldType::Number).with_values((0..rows).map(|i| i as u64)),
        )
    }

    fn request() -> QueryRequest {
        QueryRequest::new(vec![
            DataQuery::new("A").with_model("rawSql", "select a"),
            DataQuery::new("B").with_model("rawSql", "select b"),
        ])
        .with_request_id("req")
    }

    #[test]
    fn continues_targets_whose_frames_carry_tokens() {
        let response = QueryResponse::new(
            "req",
            vec![
                frame("A", 2).with_custom_meta("nextToken", "tok-a"),
                frame("B", 2),
            ],
        );

        let next = TokenContinuation::new("nextToken")
            .next_queries(&request(), &response)
            .expect("continuation expected");

        assert_eq!(next.len(), 1);
        assert_eq!(next[0].ref_id, "A");
        assert_eq!(next[0].continuation_token.as_deref(), Some("tok-a"));
        assert_eq!(next[0].model.get("rawSql"), Some(&"select a".into()));
    }

    #[test]
    fn tokens_on_empty_frames_are_ignored() {
        let response = QueryResponse::new(
            "req",
            vec![frame("A", 0).with_custom_meta("nextToken", "tok-a")],
        );
        assert!(TokenContinuation::new("nextToken")
            .next_queries(&request(), &response)
            .is_none());
    }

    #[test]
    fn unknown_ref_ids_and_other_keys_do_not_continue() {
        let response = QueryResponse::new(
            "req",
            vec![
                frame("Z", 1).with_custom_meta("nextToken", "tok-z"),
                frame("A", 1).with_custom_meta("cursor", "tok-a"),
            ],
        );
        assert!(TokenContinuation::new("nextToken")
            .next_queries(&request(), &response)
            .is_none());

        let next = TokenContinuation::from_config(&DriverConfig {
            continuation_key: "cursor".into(),
            ..DriverConfig::default()
        })
        .next_queries(&request(), &response)
        .expect("cursor key continues A");
        assert_eq!(next[0].continuation_token.as_deref(), Some("tok-a"));
    }

    #[test]
    fn closures_act_as_policies() {
        let policy = |_: &QueryRequest, _: &QueryResponse| Some(vec![DataQuery::new("A")]);
        let next = policy.next_queries(&request(), &QueryResponse::new("req", Vec::new()));
        assert_eq!(next.map(|q| q.len()), Some(1));
    }
}
