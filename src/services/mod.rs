pub(crate) mod exam_api;
