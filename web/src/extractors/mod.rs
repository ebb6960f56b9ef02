pub(crate) mod visitor;
