//! Public facade crate for `scholarstream`.
//!
//! This crate intentionally contains no IO.
//! It re-exports the reducer, sorting and session types from `scholarstream-core`.

pub use scholarstream_core::*;

#[cfg(test)]
mod tests {
    #[test]
    fn facade_exposes_reducer_and_sorting() {
        let mut s = crate::SearchSession::new().with_sort(crate::SortKey::Citations, false);
        crate::EventSink::apply(
            &mut s,
            crate::StreamEvent::Papers(vec![crate::PaperRecord::new("A")]),
        );
        assert_eq!(s.view().len(), 1);
    }
}
