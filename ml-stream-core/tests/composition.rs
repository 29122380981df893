//! Whole-pipeline behavior across composed stages

use std::thread;
use std::time::Duration;

use proptest::prelude::*;
use test_case::test_case;

use ml_stream_core::{read_list, round_robin, zip, Data, Error, Pipeline, PipelineBuilder, Tape, ZipOptions};

fn ints(values: impl IntoIterator<Item = i64>) -> Vec<Data> {
    values.into_iter().map(Data::Int).collect()
}

fn drain(pipeline: &mut Pipeline) -> Vec<Data> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let mut output = Vec::new();

    while let Some(example) = pipeline.next().unwrap() {
        output.push(example);
    }

    output
}

fn double(example: Data) -> anyhow::Result<Data> {
    let n = example.as_int().ok_or_else(|| anyhow::anyhow!("expected an int"))?;

    Ok(Data::Int(n * 2))
}

fn expand(example: &Data) -> anyhow::Result<Pipeline> {
    let n = example.as_int().unwrap_or(0) % 3;

    Ok(read_list(ints(0..n)).and_return()?)
}

/// Builders covering every stage kind, each paired with its own name
fn compositions() -> [(&'static str, fn() -> PipelineBuilder); 9] {
    [
        ("bucket", || read_list(ints(0..40)).bucket(3, false)),
        ("bucket_by_length", || {
            read_list(ints(0..40)).bucket_by_length(
                vec![(2, 10), (4, 100)],
                |d| Ok(usize::try_from(d.as_int().unwrap_or(0)).unwrap_or(0)),
                false,
                false,
            )
        }),
        ("filter_map", || {
            read_list(ints(0..40))
                .filter(|d| Ok(d.as_int().unwrap_or(0) % 3 != 0))
                .map(double, 4, false)
        }),
        ("prefetch", || read_list(ints(0..40)).map(double, 2, false).prefetch(3)),
        ("shard_skip_take", || read_list(ints(0..40)).shard(1, 3).skip(2).take(8)),
        ("shuffle", || read_list(ints(0..40)).shuffle(7, true, true).bucket(2, false)),
        ("yield_from", || read_list(ints(0..40)).yield_from(expand)),
        ("zip", || {
            let pipelines = vec![
                read_list(ints(0..40)).shuffle(5, false, true).and_return().unwrap(),
                read_list(ints(100..130)).prefetch(2).and_return().unwrap(),
            ];

            zip(pipelines, ZipOptions::default())
        }),
        ("round_robin", || {
            let pipelines = vec![
                read_list(ints(0..5)).and_return().unwrap(),
                read_list(ints(10..30)).map(double, 3, false).and_return().unwrap(),
            ];

            round_robin(pipelines).take(18)
        }),
    ]
}

#[test]
fn test_reset_replays_identical_sequence() {
    for (name, build) in compositions() {
        let mut pipeline = build().and_return().unwrap();

        let first = drain(&mut pipeline);

        pipeline.reset().unwrap();

        assert_eq!(drain(&mut pipeline), first, "{name}");
    }
}

#[test]
fn test_checkpoint_resumes_exact_suffix() {
    for (name, build) in compositions() {
        let expected = drain(&mut build().and_return().unwrap());

        for consumed in [0, 1, expected.len() / 2, expected.len()] {
            let mut pipeline = build().and_return().unwrap();

            for _ in 0..consumed {
                pipeline.next().unwrap();
            }

            let checkpoint = pipeline.save_checkpoint().unwrap();

            let mut restored = build().and_return().unwrap();
            restored.load_checkpoint(&checkpoint).unwrap();

            assert_eq!(drain(&mut restored), expected[consumed..], "{name} after {consumed}");
        }
    }
}

#[test]
fn test_checkpoint_survives_tape_bytes() {
    let build = || read_list(ints(0..20)).shuffle(4, false, true).prefetch(2).and_return().unwrap();

    let mut pipeline = build();
    for _ in 0..7 {
        pipeline.next().unwrap();
    }

    let mut tape = Tape::new();
    pipeline.record_position(&mut tape).unwrap();

    let mut tape = Tape::from_bytes(&tape.to_bytes().unwrap()).unwrap();

    let mut restored = build();
    restored.reload_position(&mut tape).unwrap();

    assert_eq!(drain(&mut restored), drain(&mut pipeline));
}

#[test_case(1 ; "single call")]
#[test_case(4 ; "four calls")]
fn test_map_with_variable_latency_keeps_order(num_parallel_calls: usize) {
    let mut pipeline = read_list(ints(1..=5))
        .map(
            |example| {
                let n = example.as_int().unwrap_or(0);

                thread::sleep(Duration::from_millis(u64::try_from(6 - n).unwrap_or(0) * 5));

                Ok(Data::Int(n * 10))
            },
            num_parallel_calls,
            false,
        )
        .and_return()
        .unwrap();

    assert_eq!(drain(&mut pipeline), ints([10, 20, 30, 40, 50]));
}

#[test]
fn test_failure_breaks_whole_pipeline() {
    let mut pipeline = read_list(ints(1..=5))
        .map(
            |example| match example.as_int() {
                Some(3) => anyhow::bail!("three is not allowed"),
                _ => Ok(example),
            },
            1,
            false,
        )
        .bucket(1, false)
        .and_return()
        .unwrap();

    assert_eq!(pipeline.next().unwrap(), Some(Data::List(ints([1]))));
    assert_eq!(pipeline.next().unwrap(), Some(Data::List(ints([2]))));

    let err = pipeline.next().unwrap_err();
    assert_eq!(err.example(), Some(&Data::Int(3)));

    assert!(matches!(pipeline.next(), Err(Error::Broken)));
    assert!(matches!(pipeline.reset(), Err(Error::Broken)));
}

#[test]
fn test_zip_of_round_robins() {
    let left = round_robin(vec![
        read_list(ints([1, 3])).and_return().unwrap(),
        read_list(ints([2, 4])).and_return().unwrap(),
    ])
    .and_return()
    .unwrap();

    let right = read_list(ints([10, 20, 30])).and_return().unwrap();

    let options = ZipOptions {
        names: Some(vec!["left".into(), "right".into()]),
        ..ZipOptions::default()
    };

    let mut pipeline = zip(vec![left, right], options).and_return().unwrap();

    let output = drain(&mut pipeline);

    assert_eq!(output.len(), 3);
    assert_eq!(output[1].as_dict().unwrap()["left"], Data::Int(2));
    assert_eq!(output[2].as_dict().unwrap()["right"], Data::Int(30));
}

proptest! {
    #[test]
    fn prop_sharded_nested_checkpoint(
        len in 0i64..60,
        num_shards in 1usize..5,
        window in 0usize..6,
        consumed in 0usize..30,
    ) {
        let build = || {
            read_list(ints(0..len))
                .shuffle(window, true, true)
                .shard(0, num_shards)
                .bucket(2, false)
                .and_return()
                .unwrap()
        };

        let expected = drain(&mut build());
        let consumed = consumed.min(expected.len());

        let mut pipeline = build();
        for _ in 0..consumed {
            pipeline.next().unwrap();
        }

        let checkpoint = pipeline.save_checkpoint().unwrap();

        let mut restored = build();
        restored.load_checkpoint(&checkpoint).unwrap();

        prop_assert_eq!(drain(&mut restored), expected[consumed..].to_vec());
    }
}
