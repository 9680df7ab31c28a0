#[cfg(test)]
mod tests {
    use crate::{
        cluster, database,
        memory::MemoryDatabase,
        utils::{
            CUSTOMERS, assert_counts, collected_customers, customers, executor, read_uris, uris_of,
        },
    };
    use engine_config::{
        options::JobOptions,
        settings::{OutputStreamType, TransformSpec, TransformStrategy},
    };
    use engine_core::error::JobError;
    use engine_processing::accumulator::Input;
    use engine_runtime::{
        query_all, query_to_read_all, query_to_remove_all, query_to_transform_all, read_all,
        remove_all, transform_all, write_all,
    };
    use model::{
        core::identifiers::Timestamp,
        partition::{Forest, PartitionUnit},
        records::document::{Category, Content, DocumentMetadata, ReadItem},
        snapshot::ConsistentSnapshot,
    };
    use serde_json::json;
    use std::{
        collections::HashSet,
        sync::{
            Arc, Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };
    use tracing_test::traced_test;

    fn two_forests() -> Arc<MemoryDatabase> {
        database(vec![
            Forest::new("docs-1", "node-a"),
            Forest::new("docs-2", "node-b"),
        ])
    }

    // Test Settings: batchSize = 100, concurrentRequests = forests x 4.
    // Scenario: 250 documents are written to a database with two forests.
    // Expected Outcome:
    // - Three batches (100, 100, 50) are dispatched across at most 8 workers.
    // - All 250 documents are stored and spread over both forests.
    // - The completion callback fires once with 250 written and 0 failed.
    #[traced_test]
    #[tokio::test]
    async fn tc01() {
        let db = two_forests();
        let batches = Arc::new(AtomicUsize::new(0));
        let completions = Arc::new(Mutex::new(Vec::new()));

        let batch_counter = batches.clone();
        let completion_log = completions.clone();
        let options = JobOptions::new()
            .batch_size(100)
            .concurrent_requests(PartitionUnit::Forests, 4)
            .on_batch_success(move |_| {
                batch_counter.fetch_add(1, Ordering::SeqCst);
            })
            .on_completion(move |summary| completion_log.lock().unwrap().push(summary.clone()));

        let handle = write_all(executor(&db), Input::from_vec(customers(250)), options)
            .await
            .unwrap();
        assert_eq!(handle.worker_count(), 8);
        let summary = handle.finish().await.unwrap();

        assert_counts(&summary, 250, 0);
        assert!(summary.is_success());
        assert_eq!(batches.load(Ordering::SeqCst), 3);
        assert_eq!(db.request_count(), 3);
        assert_eq!(db.len(), 250);
        assert!(db.forest_counts().values().all(|&n| n > 0));

        let completions = completions.lock().unwrap();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0], summary);
        assert!(logs_contain("Bulk job completed"));
    }

    // Test Settings: defaultMetadata with the customers collection.
    // Scenario: half of the documents carry their own metadata.
    // Expected Outcome: only documents without metadata receive the default.
    #[traced_test]
    #[tokio::test]
    async fn tc02() {
        let db = two_forests();
        let own = DocumentMetadata::default().collection("vip");
        let documents: Vec<_> = customers(10)
            .into_iter()
            .enumerate()
            .map(|(i, doc)| if i % 2 == 0 { doc.with_metadata(own.clone()) } else { doc })
            .collect();
        let options = JobOptions::new()
            .default_metadata(DocumentMetadata::default().collection(CUSTOMERS).quality(2));

        let summary = write_all(executor(&db), Input::from_vec(documents.clone()), options)
            .await
            .unwrap()
            .finish()
            .await
            .unwrap();
        assert_counts(&summary, 10, 0);

        for (i, doc) in documents.iter().enumerate() {
            let stored = db.get(&doc.uri).unwrap().metadata.unwrap();
            if i % 2 == 0 {
                assert_eq!(stored.collections, vec!["vip"]);
            } else {
                assert_eq!(stored.collections, vec![CUSTOMERS]);
                assert_eq!(stored.quality, Some(2));
            }
        }
    }

    // Test Settings: Default.
    // Scenario: the first two write requests fail with 503.
    // Expected Outcome: the failed batches are retried and every document is stored.
    #[traced_test]
    #[tokio::test]
    async fn tc03() {
        let db = two_forests();
        db.fail_writes(2);
        let options = JobOptions::new()
            .batch_size(25)
            .concurrent_requests(PartitionUnit::Forests, 1);

        let output = write_all(executor(&db), Input::from_vec(customers(100)), options)
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();

        assert!(output.errors.is_empty());
        assert_counts(&output.summary, 100, 0);
        assert_eq!(db.len(), 100);
        assert_eq!(db.request_count(), 6);
        assert!(logs_contain("Retrying batch"));
    }

    // Test Settings: a write transform that is not installed on the server.
    // Scenario: every write request is rejected with 400.
    // Expected Outcome:
    // - The job ends with a retries-exhausted error on the stream and in the summary.
    // - Nothing is stored.
    #[traced_test]
    #[tokio::test]
    async fn tc04() {
        let db = two_forests();
        let options = JobOptions::new()
            .batch_size(10)
            .concurrent_requests(PartitionUnit::Forests, 1)
            .transform(TransformSpec::new("missing"));

        let output = write_all(executor(&db), Input::from_vec(customers(10)), options)
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();

        assert_eq!(output.errors.len(), 1);
        assert!(matches!(
            &output.errors[0],
            JobError::RetriesExhausted { attempts: 3, last_error, .. } if last_error.status() == Some(400)
        ));
        assert!(
            output
                .summary
                .error
                .as_deref()
                .unwrap()
                .starts_with("Retry count exceeded")
        );
        assert!(db.is_empty());
    }

    // Test Settings: Default read options.
    // Scenario: all seeded documents plus two unknown URIs are read.
    // Expected Outcome:
    // - Every stored document comes back with content and without metadata.
    // - The unknown URIs are counted as failed reads.
    #[traced_test]
    #[tokio::test]
    async fn tc05() {
        let db = database(cluster());
        let seeded = collected_customers(40);
        db.seed(seeded.clone());

        let mut uris = uris_of(&seeded);
        uris.push("/customers/missing-1.json".to_string());
        uris.push("/customers/missing-2.json".to_string());

        let output = read_all(executor(&db), Input::from_vec(uris), JobOptions::new())
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();

        assert_eq!(read_uris(&output.items), uris_of(&seeded));
        assert!(output.items.iter().all(|item| matches!(
            item,
            ReadItem::Document(doc) if doc.content.is_some() && doc.metadata.is_none()
        )));
        assert_counts(&output.summary, 40, 2);
    }

    // Test Settings: categories = [collections], outputStreamType = object.
    // Scenario: documents are read for their metadata only.
    // Expected Outcome: results carry collections and no content.
    #[traced_test]
    #[tokio::test]
    async fn tc06() {
        let db = database(cluster());
        let seeded = collected_customers(12);
        db.seed(seeded.clone());
        let options = JobOptions::new()
            .categories(vec![Category::Collections])
            .output_stream_type(OutputStreamType::Object);

        let output = read_all(executor(&db), Input::from_vec(uris_of(&seeded)), options)
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();

        assert_eq!(output.items.len(), 12);
        for item in &output.items {
            let ReadItem::Document(doc) = item else {
                panic!("expected a document, got {item:?}");
            };
            assert!(doc.content.is_none());
            assert_eq!(doc.metadata.as_ref().unwrap().collections, vec![CUSTOMERS]);
        }
    }

    // Test Settings: outputStreamType = chunked.
    // Scenario: documents are read as raw content.
    // Expected Outcome: each chunk is the serialized JSON body of one document.
    #[traced_test]
    #[tokio::test]
    async fn tc07() {
        let db = database(cluster());
        let seeded = customers(5);
        db.seed(seeded.clone());
        let options = JobOptions::new().output_stream_type(OutputStreamType::Chunked);

        let output = read_all(executor(&db), Input::from_vec(uris_of(&seeded)), options)
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();

        let mut ids: Vec<u64> = output
            .items
            .iter()
            .map(|item| match item {
                ReadItem::Chunk(bytes) => {
                    let value: serde_json::Value = serde_json::from_slice(bytes).unwrap();
                    value["id"].as_u64().unwrap()
                }
                ReadItem::Document(_) => panic!("expected chunks"),
            })
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    // Test Settings: batchSize (page length) = 7.
    // Scenario: the customers collection is queried next to unrelated documents.
    // Expected Outcome: every matching URI is returned exactly once, one worker per forest.
    #[traced_test]
    #[tokio::test]
    async fn tc08() {
        let db = database(cluster());
        db.seed(collected_customers(45));
        db.seed(
            (0..10)
                .map(|i| model::records::document::Document::text(format!("/notes/{i}.txt"), "n"))
                .collect(),
        );

        let handle = query_all(
            executor(&db),
            json!({ "collection": CUSTOMERS }),
            JobOptions::new().batch_size(7),
        )
        .await
        .unwrap();
        assert_eq!(handle.worker_count(), 4);
        let output = handle.collect().await.unwrap();

        assert!(output.items.iter().all(|page| page.len() <= 7));
        let uris: Vec<String> = output.items.into_iter().flatten().collect();
        let unique: HashSet<&String> = uris.iter().collect();
        assert_eq!(uris.len(), 45);
        assert_eq!(unique.len(), 45);
        assert!(uris.iter().all(|uri| uri.starts_with("/customers/")));
        assert_counts(&output.summary, 45, 0);
    }

    // Test Settings: query consistentSnapshot = true, batchSize = 10.
    // Scenario: the customers collection is read through a query -> read pipeline.
    // Expected Outcome:
    // - Every customer is read once and the initial-timestamp callback fires once.
    // - The summary reports the read counts and the snapshot timestamp.
    #[traced_test]
    #[tokio::test]
    async fn tc09() {
        let db = database(cluster());
        let seeded = collected_customers(63);
        db.seed(seeded.clone());
        let timestamps = Arc::new(Mutex::new(Vec::new()));
        let seen = timestamps.clone();

        let query_options = JobOptions::new()
            .batch_size(10)
            .consistent_snapshot(ConsistentSnapshot::Latest)
            .on_initial_timestamp(move |ts: &Timestamp| seen.lock().unwrap().push(ts.clone()));

        let output = query_to_read_all(
            executor(&db),
            json!({ "collection": CUSTOMERS }),
            query_options,
            JobOptions::new(),
        )
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();

        assert_eq!(read_uris(&output.items), uris_of(&seeded));
        assert_counts(&output.summary, 63, 0);

        let timestamps = timestamps.lock().unwrap();
        assert_eq!(timestamps.len(), 1);
        assert_eq!(
            output.summary.consistent_snapshot_timestamp.as_ref(),
            Some(&timestamps[0])
        );
    }

    // Test Settings: transform "stamp" with by = "integration".
    // Scenario: the customers collection is transformed through a query -> transform pipeline.
    // Expected Outcome: every customer document is stamped; other documents are untouched.
    #[traced_test]
    #[tokio::test]
    async fn tc10() {
        let db = database(cluster());
        let seeded = collected_customers(30);
        db.seed(seeded.clone());
        db.seed(customers(35).split_off(30));

        let summary = query_to_transform_all(
            executor(&db),
            json!({ "collection": CUSTOMERS }),
            JobOptions::new().batch_size(8),
            JobOptions::new().transform(TransformSpec::new("stamp").param("by", "integration")),
        )
        .await
        .unwrap()
        .finish()
        .await
        .unwrap();

        assert_counts(&summary, 30, 0);
        for doc in &seeded {
            let Some(Content::Json(value)) = db.get(&doc.uri).unwrap().content else {
                panic!("expected JSON content for {}", doc.uri);
            };
            assert_eq!(value["stampedBy"], "integration");
        }
        let untouched = db.get("/customers/00032.json").unwrap();
        assert_eq!(untouched.content, customers(33)[32].content);
    }

    // Test Settings: transformStrategy = ignore.
    // Scenario: documents are transformed without writing the result back.
    // Expected Outcome: all URIs are counted as transformed and the stored documents are unchanged.
    #[traced_test]
    #[tokio::test]
    async fn tc11() {
        let db = database(cluster());
        let seeded = customers(20);
        db.seed(seeded.clone());
        let options = JobOptions::new()
            .transform(TransformSpec::new("stamp"))
            .transform_strategy(TransformStrategy::Ignore);

        let summary = transform_all(executor(&db), Input::from_vec(uris_of(&seeded)), options)
            .await
            .unwrap()
            .finish()
            .await
            .unwrap();

        assert_counts(&summary, 20, 0);
        for doc in &seeded {
            assert_eq!(db.get(&doc.uri).unwrap(), *doc);
        }
    }

    // Test Settings: query consistentSnapshot = true, batchSize = 5.
    // Scenario: the customers collection is deleted while the query is still paging.
    // Expected Outcome:
    // - Every customer is removed; unrelated documents remain.
    // - The summary is reported under the remove keys.
    #[traced_test]
    #[tokio::test]
    async fn tc12() {
        let db = database(cluster());
        db.seed(collected_customers(50));
        db.seed(customers(60).split_off(50));

        let summary = query_to_remove_all(
            executor(&db),
            json!({ "collection": CUSTOMERS }),
            JobOptions::new()
                .batch_size(5)
                .consistent_snapshot(ConsistentSnapshot::Latest),
            JobOptions::new(),
        )
        .await
        .unwrap()
        .finish()
        .await
        .unwrap();

        assert_counts(&summary, 50, 0);
        assert_eq!(db.len(), 10);

        let report = serde_json::to_value(&summary).unwrap();
        assert_eq!(report["docsRemovedSuccessfully"], 50);
        assert_eq!(report["docsFailedToBeRemoved"], 0);
        assert!(report.get("error").is_none());
    }

    // Test Settings: Default.
    // Scenario: a query that matches nothing feeds a remove pipeline.
    // Expected Outcome: no documents are removed and the query summary is reported.
    #[traced_test]
    #[tokio::test]
    async fn tc13() {
        let db = database(cluster());
        db.seed(customers(10));

        let summary = query_to_remove_all(
            executor(&db),
            json!({ "collection": "nobody" }),
            JobOptions::new(),
            JobOptions::new(),
        )
        .await
        .unwrap()
        .finish()
        .await
        .unwrap();

        assert_counts(&summary, 0, 0);
        assert_eq!(db.len(), 10);
        assert!(logs_contain("consumer not started"));
    }

    // Test Settings: concurrentRequests = hosts x 2.
    // Scenario: documents are removed by URI on a four-forest, two-host cluster.
    // Expected Outcome: the job runs four workers and removes everything.
    #[traced_test]
    #[tokio::test]
    async fn tc14() {
        let db = database(cluster());
        let seeded = customers(75);
        db.seed(seeded.clone());
        let options = JobOptions::new()
            .batch_size(10)
            .concurrent_requests(PartitionUnit::Hosts, 2);

        let handle = remove_all(executor(&db), Input::from_vec(uris_of(&seeded)), options)
            .await
            .unwrap();
        assert_eq!(handle.worker_count(), 4);
        let summary = handle.finish().await.unwrap();

        assert_counts(&summary, 75, 0);
        assert!(db.is_empty());
    }
}
