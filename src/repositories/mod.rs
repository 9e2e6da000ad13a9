pub(crate) mod exam_history;
