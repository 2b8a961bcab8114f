use std::collections::HashMap;

use crate::frame::Frame;
use crate::schema_key::SchemaKey;

/// Merge a freshly fetched page of frames into the frames accumulated so far.
///
/// Frames whose [`SchemaKey`] matches an earlier frame have their rows
/// appended to it column by column; all other non-empty frames are added at
/// the end in first-seen order. Zero-row frames are dropped from both sides.
/// Accumulated frames missing from `incoming` are kept as-is.
///
/// `previous` is only borrowed: the result is a new vector, so a snapshot
/// holding the previous accumulation stays valid after the merge. This costs
/// a copy of the accumulated rows per call.
///
/// Ragged frames are passed through untouched and never merged.
pub fn merge_frames(previous: &[Frame], incoming: Vec<Frame>) -> Vec<Frame> {
    let mut merged: Vec<Frame> = Vec::with_capacity(previous.len() + incoming.len());
    let mut by_key: HashMap<SchemaKey, usize> = HashMap::new();

    // Ragged accumulated frames were reported when they first arrived.
    for frame in previous.iter().filter(|frame| !frame.is_empty()) {
        if frame.validate().is_ok() {
            by_key.insert(frame.schema_key(), merged.len());
        }
        merged.push(frame.clone());
    }

    for frame in incoming {
        if frame.is_empty() {
            continue;
        }
        if !is_mergeable(&frame) {
            merged.push(frame);
            continue;
        }
        let key = frame.schema_key();
        match by_key.get(&key) {
            Some(&slot) => append_rows(&mut merged[slot], frame),
            None => {
                by_key.insert(key, merged.len());
                merged.push(frame);
            }
        }
    }

    merged
}

/// Total number of rows across `frames`.
pub fn total_rows(frames: &[Frame]) -> usize {
    frames.iter().map(Frame::row_count).sum()
}

fn is_mergeable(frame: &Frame) -> bool {
    match frame.validate() {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(%err, "skipping merge for ragged frame");
            false
        }
    }
}

// Keys already match, so fields line up by position.
fn append_rows(target: &mut Frame, source: Frame) {
    for (dst, src) in target.fields.iter_mut().zip(source.fields) {
        dst.values.extend(src.values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Field, FieldType};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    struct CountWarnings(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for CountWarnings {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn page(ref_id: &str, times: &[i64], values: &[f64]) -> Frame {
        Frame::new(ref_id)
            .with_field(Field::new("time", FieldType::Time).with_values(times.iter().copied()))
            .with_field(
                Field::new("value", FieldType::Number).with_values(values.iter().copied()),
            )
    }

    fn column(frame: &Frame, idx: usize) -> Vec<Value> {
        frame.fields[idx].values.clone()
    }

    #[test]
    fn matching_frames_concatenate_rows_in_order() {
        let previous = vec![page("A", &[1, 2], &[10.0, 20.0])];
        let incoming = vec![page("A", &[3, 4, 5], &[30.0, 40.0, 50.0])];

        let merged = merge_frames(&previous, incoming);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].row_count(), 5);
        assert_eq!(column(&merged[0], 0), vec![json!(1), json!(2), json!(3), json!(4), json!(5)]);
        assert_eq!(
            column(&merged[0], 1),
            vec![json!(10.0), json!(20.0), json!(30.0), json!(40.0), json!(50.0)]
        );
    }

    #[test]
    fn previous_is_left_untouched() {
        let previous = vec![page("A", &[1], &[1.0])];
        let merged = merge_frames(&previous, vec![page("A", &[2], &[2.0])]);
        assert_eq!(previous[0].row_count(), 1);
        assert_eq!(merged[0].row_count(), 2);
    }

    #[test]
    fn different_types_or_labels_are_never_merged() {
        let numeric = page("A", &[1], &[1.0]);
        let textual = Frame::new("A")
            .with_field(Field::new("time", FieldType::Time).with_values([2]))
            .with_field(Field::new("value", FieldType::String).with_values(["two"]));
        let mut labelled = page("A", &[3], &[3.0]);
        labelled.fields[1] = labelled.fields[1].clone().with_label("host", "b");

        let merged = merge_frames(&[numeric], vec![textual, labelled]);

        assert_eq!(merged.len(), 3);
        assert!(merged.iter().all(|frame| frame.row_count() == 1));
    }

    #[test]
    fn zero_row_frames_are_dropped_on_both_sides() {
        let previous = vec![Frame::new("A"), page("B", &[1], &[1.0])];
        let incoming = vec![
            page("C", &[], &[]).with_custom_meta("nextToken", "ignored"),
            page("B", &[2], &[2.0]),
        ];

        let merged = merge_frames(&previous, incoming);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].ref_id.as_deref(), Some("B"));
        assert_eq!(merged[0].row_count(), 2);
    }

    #[test]
    fn repeated_schema_in_one_page_merges_at_first_position() {
        let incoming = vec![
            page("A", &[1], &[1.0]),
            page("B", &[1], &[9.0]),
            page("A", &[2], &[2.0]),
        ];

        let merged = merge_frames(&[], incoming);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].ref_id.as_deref(), Some("A"));
        assert_eq!(column(&merged[0], 0), vec![json!(1), json!(2)]);
        assert_eq!(column(&merged[0], 1), vec![json!(1.0), json!(2.0)]);
        assert_eq!(merged[1].ref_id.as_deref(), Some("B"));
    }

    #[test]
    fn frames_absent_from_incoming_are_retained() {
        let previous = vec![page("A", &[1], &[1.0]), page("B", &[1], &[2.0])];
        let merged = merge_frames(&previous, vec![page("B", &[2], &[3.0])]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], previous[0]);
        assert_eq!(merged[1].row_count(), 2);
        assert_eq!(total_rows(&merged), 3);
    }

    #[test]
    fn ragged_frames_pass_through_without_merging() {
        let mut ragged = page("A", &[2, 3], &[2.0, 3.0]);
        ragged.fields[1].values.pop();
        let previous = vec![page("A", &[1], &[1.0])];

        let merged = merge_frames(&previous, vec![ragged.clone()]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].row_count(), 1);
        assert_eq!(merged[1], ragged);
    }

    #[test]
    fn ragged_frame_is_reported_once_across_merges() {
        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(CountWarnings(warnings.clone()));
        let mut ragged = page("A", &[1, 2], &[1.0, 2.0]);
        ragged.fields[1].values.pop();

        let merged = tracing::subscriber::with_default(subscriber, || {
            let first = merge_frames(&[], vec![ragged.clone()]);
            let second = merge_frames(&first, vec![page("B", &[1], &[1.0])]);
            merge_frames(&second, vec![page("B", &[2], &[2.0])])
        });

        assert_eq!(warnings.load(Ordering::SeqCst), 1);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], ragged);
        assert_eq!(merged[1].row_count(), 2);
    }
}
