//! Helpers shared by the unit tests

use crate::data::Data;
use crate::pipeline::Pipeline;

pub(crate) fn ints(values: &[i64]) -> Vec<Data> {
    values.iter().copied().map(Data::Int).collect()
}

pub(crate) fn strings(values: &[&str]) -> Vec<Data> {
    values.iter().copied().map(Data::from).collect()
}

pub(crate) fn lists(values: &[&[i64]]) -> Vec<Data> {
    values.iter().map(|list| Data::List(ints(list))).collect()
}

/// Pull until the end of the stream, panicking on errors
pub(crate) fn drain(pipeline: &mut Pipeline) -> Vec<Data> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let mut output = Vec::new();

    while let Some(example) = pipeline.next().unwrap() {
        output.push(example);
    }

    output
}
