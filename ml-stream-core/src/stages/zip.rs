//! Position-wise combination of several pipelines

use std::collections::{BTreeMap, HashSet};

use rayon::prelude::*;
use tracing::warn;

use super::{into_sources, record_sources, reload_sources};
use crate::builder::PipelineBuilder;
use crate::data::Data;
use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::source::{BoxSource, Source};
use crate::tape::Tape;

/// Options for [`zip`]
#[derive(Debug, Clone, Default)]
pub struct ZipOptions {
    /// Key of each pipeline in the combined dict; a list is produced if unset
    pub names: Option<Vec<String>>,

    /// Merge dict elements, or concatenate list elements, into one element
    pub flatten: bool,

    /// Skip a position instead of failing when it cannot be combined
    pub warn_only: bool,

    /// Pull the pipelines one after another instead of concurrently
    pub disable_parallelism: bool,
}

/// Pulls one element from every source and combines them
///
/// A failed pull leaves the child source usable, so under `warn_only` the
/// position is dropped and the next pull moves on to the following one.
pub struct ZipSource {
    sources: Vec<BoxSource>,
    options: ZipOptions,
}

impl ZipSource {
    /// Combine `sources` according to `options`
    pub fn new(sources: Vec<BoxSource>, options: ZipOptions) -> Self {
        Self { sources, options }
    }

    fn label(&self, idx: usize) -> String {
        match &self.options.names {
            Some(names) => format!("'{}'", names[idx]),
            None => format!("#{idx}"),
        }
    }

    fn pull_all(&mut self) -> Vec<Result<Option<Data>>> {
        if self.options.disable_parallelism || self.sources.len() < 2 {
            self.sources.iter_mut().map(|source| source.next()).collect()
        } else {
            self.sources.par_iter_mut().map(|source| source.next()).collect()
        }
    }

    fn combine(&self, examples: Vec<Data>) -> Result<Data> {
        if let Some(names) = &self.options.names {
            return Ok(Data::Dict(names.iter().cloned().zip(examples).collect()));
        }

        if !self.options.flatten {
            return Ok(Data::List(examples));
        }

        if examples.iter().all(|example| matches!(example, Data::Dict(_))) {
            return merge_dicts(examples);
        }

        let mut flat = Vec::with_capacity(examples.len());

        for example in examples {
            match example {
                Data::List(items) => flat.extend(items),
                other => flat.push(other),
            }
        }

        Ok(Data::List(flat))
    }
}

fn merge_dicts(examples: Vec<Data>) -> Result<Data> {
    let mut seen = HashSet::new();

    for key in examples.iter().filter_map(Data::as_dict).flat_map(BTreeMap::keys) {
        if !seen.insert(key) {
            let message = format!("The zipped examples have more than one element with the key '{key}'.");

            return Err(Error::pipeline(message, Some(Data::List(examples.clone()))));
        }
    }

    let merged = examples
        .into_iter()
        .filter_map(|example| example.into_dict().ok())
        .flatten()
        .collect();

    Ok(Data::Dict(merged))
}

impl Source for ZipSource {
    fn next(&mut self) -> Result<Option<Data>> {
        loop {
            let outputs = self.pull_all();

            let mut examples = Vec::with_capacity(outputs.len());
            let mut failure = None;
            let mut fatal = false;
            let mut exhausted = false;

            for (idx, output) in outputs.into_iter().enumerate() {
                match output {
                    Ok(Some(example)) => examples.push(example),
                    Ok(None) => exhausted = true,
                    Err(err) => {
                        fatal |= err.is_broken();

                        if failure.is_none() {
                            let message = format!("The data pipeline {} has failed.", self.label(idx));

                            failure = Some(Error::nested(message, err, None));
                        }
                    }
                }
            }

            if let Some(err) = failure {
                if self.options.warn_only && !fatal {
                    warn!(error = %err, example = ?err.example(), "Skipping zipped example");

                    continue;
                }

                return Err(err);
            }

            if exhausted {
                return Ok(None);
            }

            match self.combine(examples) {
                Ok(combined) => return Ok(Some(combined)),
                Err(err) if self.options.warn_only => {
                    warn!(error = %err, "Skipping zipped example");
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn reset(&mut self) -> Result<()> {
        for source in &mut self.sources {
            source.reset()?;
        }

        Ok(())
    }

    fn record_position(&mut self, tape: &mut Tape) -> Result<()> {
        record_sources(&mut self.sources, tape)
    }

    fn reload_position(&mut self, tape: &mut Tape) -> Result<()> {
        reload_sources(&mut self.sources, tape)
    }
}

/// Combine the elements of `pipelines` position by position
///
/// The output ends as soon as any pipeline ends.
pub fn zip(pipelines: Vec<Pipeline>, options: ZipOptions) -> PipelineBuilder {
    if pipelines.is_empty() {
        return PipelineBuilder::invalid(Error::InvalidArgument("`pipelines` must contain at least one pipeline".into()));
    }

    if let Some(names) = &options.names {
        if names.len() != pipelines.len() {
            return PipelineBuilder::invalid(Error::InvalidArgument(format!(
                "The number of `names` ({}) must match the number of `pipelines` ({})",
                names.len(),
                pipelines.len()
            )));
        }

        let unique: HashSet<&String> = names.iter().collect();

        if unique.len() != names.len() {
            return PipelineBuilder::invalid(Error::InvalidArgument("`names` must be unique".into()));
        }

        if options.flatten {
            return PipelineBuilder::invalid(Error::InvalidArgument(
                "`names` and `flatten` are mutually exclusive".into(),
            ));
        }
    }

    PipelineBuilder::new(move || Ok(Box::new(ZipSource::new(into_sources(pipelines)?, options))))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use test_case::test_case;

    use super::*;
    use crate::stages::read_list;
    use crate::test_util::{drain, ints, lists, strings};

    fn pair(a: &[i64], b: &[i64], disable_parallelism: bool) -> Pipeline {
        let options = ZipOptions {
            disable_parallelism,
            ..ZipOptions::default()
        };

        zip(
            vec![read_list(ints(a)).and_return().unwrap(), read_list(ints(b)).and_return().unwrap()],
            options,
        )
        .and_return()
        .unwrap()
    }

    #[test_case(false ; "parallel")]
    #[test_case(true ; "sequential")]
    fn test_pairs_elements(disable_parallelism: bool) {
        let mut pipeline = pair(&[1, 2, 3], &[10, 20, 30], disable_parallelism);

        assert_eq!(drain(&mut pipeline), lists(&[&[1, 10], &[2, 20], &[3, 30]]));
    }

    #[test]
    fn test_shorter_input_ends_zip() {
        let mut pipeline = pair(&[1, 2, 3], &[10], false);

        assert_eq!(drain(&mut pipeline), lists(&[&[1, 10]]));
    }

    #[test]
    fn test_names_produce_dicts() {
        let options = ZipOptions {
            names: Some(vec!["src".into(), "tgt".into()]),
            ..ZipOptions::default()
        };

        let mut pipeline = zip(
            vec![
                read_list(strings(&["a"])).and_return().unwrap(),
                read_list(strings(&["b"])).and_return().unwrap(),
            ],
            options,
        )
        .and_return()
        .unwrap();

        let expected: BTreeMap<String, Data> =
            [("src".to_owned(), Data::from("a")), ("tgt".to_owned(), Data::from("b"))].into();

        assert_eq!(pipeline.next().unwrap(), Some(Data::Dict(expected)));
    }

    fn dict(key: &str, value: i64) -> Data {
        Data::Dict([(key.to_owned(), Data::Int(value))].into())
    }

    #[test]
    fn test_flatten_merges_dicts() {
        let options = ZipOptions {
            flatten: true,
            ..ZipOptions::default()
        };

        let mut pipeline = zip(
            vec![
                read_list(vec![dict("a", 1)]).and_return().unwrap(),
                read_list(vec![dict("b", 2)]).and_return().unwrap(),
            ],
            options,
        )
        .and_return()
        .unwrap();

        let expected: BTreeMap<String, Data> = [("a".to_owned(), Data::Int(1)), ("b".to_owned(), Data::Int(2))].into();

        assert_eq!(pipeline.next().unwrap(), Some(Data::Dict(expected)));
    }

    #[test]
    fn test_flatten_concatenates_lists() {
        let options = ZipOptions {
            flatten: true,
            ..ZipOptions::default()
        };

        let mut pipeline = zip(
            vec![
                read_list(lists(&[&[1, 2]])).and_return().unwrap(),
                read_list(ints(&[3])).and_return().unwrap(),
            ],
            options,
        )
        .and_return()
        .unwrap();

        assert_eq!(drain(&mut pipeline), lists(&[&[1, 2, 3]]));
    }

    #[test_case(false ; "fatal")]
    #[test_case(true ; "warn only")]
    fn test_duplicate_keys(warn_only: bool) {
        let options = ZipOptions {
            flatten: true,
            warn_only,
            ..ZipOptions::default()
        };

        let mut pipeline = zip(
            vec![
                read_list(vec![dict("a", 1), dict("a", 2)]).and_return().unwrap(),
                read_list(vec![dict("a", 3), dict("b", 4)]).and_return().unwrap(),
            ],
            options,
        )
        .and_return()
        .unwrap();

        if warn_only {
            let expected: BTreeMap<String, Data> =
                [("a".to_owned(), Data::Int(2)), ("b".to_owned(), Data::Int(4))].into();

            assert_eq!(drain(&mut pipeline), vec![Data::Dict(expected)]);
        } else {
            assert!(matches!(pipeline.next(), Err(Error::Pipeline { .. })));
            assert!(pipeline.is_broken());
        }
    }

    #[test]
    fn test_failure_names_sub_pipeline() {
        let failing = read_list(ints(&[1]))
            .map(|_| anyhow::bail!("boom"), 1, false)
            .and_return()
            .unwrap();

        let options = ZipOptions {
            names: Some(vec!["good".into(), "bad".into()]),
            ..ZipOptions::default()
        };

        let mut pipeline = zip(vec![read_list(ints(&[1])).and_return().unwrap(), failing], options)
            .and_return()
            .unwrap();

        let err = pipeline.next().unwrap_err();

        assert_eq!(err.to_string(), "The data pipeline 'bad' has failed.");
        assert_eq!(err.example(), Some(&Data::Int(1)));
    }

    #[test_case(false ; "parallel")]
    #[test_case(true ; "sequential")]
    fn test_warn_only_skips_failed_position(disable_parallelism: bool) {
        let failing = read_list(ints(&[1, 2, 3, 4]))
            .map(
                |example| match example.as_int() {
                    Some(2) => anyhow::bail!("two is not allowed"),
                    _ => Ok(example),
                },
                1,
                false,
            )
            .and_return()
            .unwrap();

        let options = ZipOptions {
            warn_only: true,
            disable_parallelism,
            ..ZipOptions::default()
        };

        let mut pipeline = zip(vec![read_list(ints(&[10, 20, 30, 40])).and_return().unwrap(), failing], options)
            .and_return()
            .unwrap();

        assert_eq!(drain(&mut pipeline), lists(&[&[10, 1], &[30, 3], &[40, 4]]));
        assert!(!pipeline.is_broken());
    }

    #[test]
    fn test_broken_sub_pipeline_is_rejected() {
        let mut broken = PipelineBuilder::new(|| Err(Error::Resource("no handles left".into())))
            .and_return()
            .unwrap();

        assert!(broken.next().is_err());

        let options = ZipOptions {
            warn_only: true,
            ..ZipOptions::default()
        };

        let mut pipeline = zip(vec![read_list(ints(&[1])).and_return().unwrap(), broken], options)
            .and_return()
            .unwrap();

        assert!(pipeline.next().unwrap_err().is_broken());
    }

    #[test_case(ZipOptions { names: Some(vec!["a".into()]), ..ZipOptions::default() } ; "name count")]
    #[test_case(ZipOptions { names: Some(vec!["a".into(), "a".into()]), ..ZipOptions::default() } ; "duplicate names")]
    #[test_case(ZipOptions { names: Some(vec!["a".into(), "b".into()]), flatten: true, ..ZipOptions::default() } ; "names with flatten")]
    fn test_invalid_options(options: ZipOptions) {
        let pipelines = vec![
            read_list(ints(&[1])).and_return().unwrap(),
            read_list(ints(&[2])).and_return().unwrap(),
        ];

        assert!(matches!(zip(pipelines, options).and_return(), Err(Error::InvalidArgument(_))));
    }
}
