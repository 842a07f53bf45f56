pub(crate) mod exam;
