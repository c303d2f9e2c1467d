//! This bench validates a generated corpus: shared includes, cross-document
//! labels and object references, loaded from disk and then checked end to
//! end.

#![allow(missing_docs)]

use std::{fmt::Write as _, fs, path::Path};

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use docref::{validate, Config, Directory};
use tempfile::TempDir;

const DOCUMENTS: usize = 200;

/// Writes a corpus of interlinked documents
fn preseed_directory(root: &Path) {
    fs::create_dir_all(root.join("includes")).unwrap();
    fs::create_dir_all(root.join("reference")).unwrap();

    fs::write(
        root.join("includes/fact-shared.rst"),
        ".. note::\n\n   Shared text with a :ref:`section-0` link.\n",
    )
    .unwrap();

    let mut toctree = String::from(".. toctree::\n   :titlesonly:\n\n");
    for i in 0..DOCUMENTS {
        writeln!(toctree, "   /section-{i}").unwrap();

        let next = (i + 1) % DOCUMENTS;
        let source = format!(
            ".. _section-{i}:\n\n\
             ===========\n\
             Section {i:03}\n\
             ===========\n\n\
             .. include:: /includes/fact-shared.rst\n\n\
             See :ref:`section-{next}`, :doc:`/reference/command-{i}` and\n\
             :dbcommand:`command{i}`. Also :issue:`SERVER-{i}`.\n\n\
             .. code-block:: javascript\n\n   db.runCommand({{ command{i}: 1 }})\n"
        );
        fs::write(root.join(format!("section-{i}.txt")), source).unwrap();

        fs::write(
            root.join(format!("reference/command-{i}.txt")),
            format!(".. dbcommand:: command{i}\n\n   Runs command {i}.\n"),
        )
        .unwrap();
    }
    fs::write(root.join("index.txt"), toctree).unwrap();
}

fn resolve_corpus(c: &mut Criterion) {
    let tmp_dir = TempDir::new().unwrap();
    preseed_directory(tmp_dir.path());

    c.bench_function("load and validate", |b| {
        b.iter(|| {
            Directory::new(tmp_dir.path().to_path_buf())
                .load()
                .unwrap()
                .validate()
        });
    });

    let directory = Directory::new(tmp_dir.path().to_path_buf())
        .load()
        .unwrap();
    c.bench_function("validate", |b| {
        b.iter_batched(
            Config::default,
            |config| validate(directory.corpus(), &config),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, resolve_corpus);
criterion_main!(benches);
