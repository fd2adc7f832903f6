//! JSON shapes served by the Spark master UI and the application REST API.
//!
//! Missing fields decode to zero values so that partially populated responses
//! (e.g. a stage that has not launched a task yet) still walk.

use std::collections::HashMap;

use serde::Deserialize;

use crate::record_fields;

/// Subset of the master's `/json/` document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MasterState {
    pub activeapps: Vec<App>,
}

/// Application descriptor as listed by the master.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct App {
    pub id: String,
    pub starttime: i64,
    pub name: String,
    pub cores: i32,
    pub user: String,
    pub memoryperslave: i32,
    pub submitdate: String,
    pub state: String,
    pub duration: i64,
}

/// `/api/v1/applications/{id}/jobs/` element.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SparkJob {
    pub job_id: i32,
    pub name: String,
    pub submission_time: String,
    pub stage_ids: Vec<i64>,
    pub status: String,
    pub num_tasks: i64,
    pub num_active_tasks: i64,
    pub num_completed_tasks: i64,
    pub num_skipped_tasks: i64,
    pub num_failed_tasks: i64,
    pub num_killed_tasks: i64,
    pub num_completed_indices: i64,
    pub num_active_stages: i64,
    pub num_completed_stages: i64,
    pub num_skipped_stages: i64,
    pub num_failed_stages: i64,
}

record_fields!(SparkJob {
    "JobID" => job_id,
    "Name" => name,
    "SubmissionTime" => submission_time,
    "StageIds" => stage_ids,
    "Status" => status,
    "NumTasks" => num_tasks,
    "NumActiveTasks" => num_active_tasks,
    "NumCompletedTasks" => num_completed_tasks,
    "NumSkippedTasks" => num_skipped_tasks,
    "NumFailedTasks" => num_failed_tasks,
    "NumKilledTasks" => num_killed_tasks,
    "NumCompletedIndices" => num_completed_indices,
    "NumActiveStages" => num_active_stages,
    "NumCompletedStages" => num_completed_stages,
    "NumSkippedStages" => num_skipped_stages,
    "NumFailedStages" => num_failed_stages,
});

/// `/api/v1/applications/{id}/stages` element.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SparkStage {
    pub status: String,
    pub stage_id: i32,
    pub attempt_id: i32,
    pub num_tasks: i64,
    pub num_active_tasks: i64,
    pub num_complete_tasks: i64,
    pub num_failed_tasks: i64,
    pub num_killed_tasks: i64,
    pub num_completed_indices: i64,
    pub executor_run_time: i64,
    pub executor_cpu_time: i64,
    pub submission_time: String,
    pub first_task_launched_time: String,
    pub input_bytes: i64,
    pub input_records: i64,
    pub output_bytes: i64,
    pub output_records: i64,
    pub shuffle_read_bytes: i64,
    pub shuffle_read_records: i64,
    pub shuffle_write_bytes: i64,
    pub shuffle_write_records: i64,
    pub memory_bytes_spilled: i64,
    pub disk_bytes_spilled: i64,
    pub name: String,
    pub scheduling_pool: String,
    pub rdd_ids: Vec<i64>,
}

record_fields!(SparkStage {
    "Status" => status,
    "StageID" => stage_id,
    "AttemptID" => attempt_id,
    "NumTasks" => num_tasks,
    "NumActiveTasks" => num_active_tasks,
    "NumCompleteTasks" => num_complete_tasks,
    "NumFailedTasks" => num_failed_tasks,
    "NumKilledTasks" => num_killed_tasks,
    "NumCompletedIndices" => num_completed_indices,
    "ExecutorRunTime" => executor_run_time,
    "ExecutorCPUTime" => executor_cpu_time,
    "SubmissionTime" => submission_time,
    "FirstTaskLaunchedTime" => first_task_launched_time,
    "InputBytes" => input_bytes,
    "InputRecords" => input_records,
    "OutputBytes" => output_bytes,
    "OutputRecords" => output_records,
    "ShuffleReadBytes" => shuffle_read_bytes,
    "ShuffleReadRecords" => shuffle_read_records,
    "ShuffleWriteBytes" => shuffle_write_bytes,
    "ShuffleWriteRecords" => shuffle_write_records,
    "MemoryBytesSpilled" => memory_bytes_spilled,
    "DiskBytesSpilled" => disk_bytes_spilled,
    "Name" => name,
    "SchedulingPool" => scheduling_pool,
    "RddIds" => rdd_ids,
});

/// Storage memory breakdown embedded in every executor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemoryMetrics {
    pub used_on_heap_storage_memory: i64,
    pub used_off_heap_storage_memory: i64,
    pub total_on_heap_storage_memory: i64,
    pub total_off_heap_storage_memory: i64,
}

record_fields!(MemoryMetrics {
    "UsedOnHeapStorageMemory" => used_on_heap_storage_memory,
    "UsedOffHeapStorageMemory" => used_off_heap_storage_memory,
    "TotalOnHeapStorageMemory" => total_on_heap_storage_memory,
    "TotalOffHeapStorageMemory" => total_off_heap_storage_memory,
});

/// `/api/v1/applications/{id}/executors` element.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SparkExecutor {
    pub id: String,
    pub host_port: String,
    pub is_active: bool,
    pub rdd_blocks: i32,
    pub memory_used: i64,
    pub disk_used: i64,
    pub total_cores: i32,
    pub max_tasks: i32,
    pub active_tasks: i32,
    pub failed_tasks: i64,
    pub completed_tasks: i64,
    pub total_tasks: i64,
    pub total_duration: i64,
    #[serde(rename = "totalGCTime")]
    pub total_gc_time: i64,
    pub total_input_bytes: i64,
    pub total_shuffle_read: i64,
    pub total_shuffle_write: i64,
    pub is_blacklisted: bool,
    pub max_memory: i64,
    pub add_time: String,
    pub memory_metrics: MemoryMetrics,
    pub executor_logs: HashMap<String, String>,
}

record_fields!(SparkExecutor {
    "ID" => id,
    "HostPort" => host_port,
    "IsActive" => is_active,
    "RddBlocks" => rdd_blocks,
    "MemoryUsed" => memory_used,
    "DiskUsed" => disk_used,
    "TotalCores" => total_cores,
    "MaxTasks" => max_tasks,
    "ActiveTasks" => active_tasks,
    "FailedTasks" => failed_tasks,
    "CompletedTasks" => completed_tasks,
    "TotalTasks" => total_tasks,
    "TotalDuration" => total_duration,
    "TotalGCTime" => total_gc_time,
    "TotalInputBytes" => total_input_bytes,
    "TotalShuffleRead" => total_shuffle_read,
    "TotalShuffleWrite" => total_shuffle_write,
    "IsBlacklisted" => is_blacklisted,
    "MaxMemory" => max_memory,
    "AddTime" => add_time,
    "MemoryMetrics" => memory_metrics as nested,
    "ExecutorLogs" => executor_logs,
});

/// `/api/v1/applications/{id}/streaming/statistics` document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SparkStreamStats {
    pub batch_duration: i64,
    pub num_receivers: i32,
    pub num_active_receivers: i32,
    pub num_inactive_receivers: i32,
    pub num_total_completed_batches: i64,
    pub num_retained_completed_batches: i64,
    pub num_active_batches: i64,
    pub num_processed_records: i64,
    pub num_received_records: i64,
    pub avg_input_rate: f64,
    pub avg_scheduling_delay: i64,
    pub avg_processing_time: i64,
    pub avg_total_delay: i64,
}

record_fields!(SparkStreamStats {
    "BatchDuration" => batch_duration,
    "NumReceivers" => num_receivers,
    "NumActiveReceivers" => num_active_receivers,
    "NumInactiveReceivers" => num_inactive_receivers,
    "NumTotalCompletedBatches" => num_total_completed_batches,
    "NumRetainedCompletedBatches" => num_retained_completed_batches,
    "NumActiveBatches" => num_active_batches,
    "NumProcessedRecords" => num_processed_records,
    "NumReceivedRecords" => num_received_records,
    "AvgInputRate" => avg_input_rate,
    "AvgSchedulingDelay" => avg_scheduling_delay,
    "AvgProcessingTime" => avg_processing_time,
    "AvgTotalDelay" => avg_total_delay,
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{FieldKind, Record};

    fn kinds_of(record: &dyn Record) -> Vec<(&'static str, FieldKind)> {
        let mut out = Vec::new();
        record.visit_fields(&mut |f| out.push((f.name, f.kind())));
        out
    }

    #[test]
    fn test_master_state_decode() {
        let body = r#"{
            "url": "spark://master:7077",
            "activeapps": [{
                "id": "app-20190605145937-0017",
                "starttime": 1559746777000,
                "name": "etl",
                "cores": 8,
                "user": "spark",
                "memoryperslave": 1024,
                "submitdate": "Wed Jun 05 14:59:37 UTC 2019",
                "state": "RUNNING",
                "duration": 4200
            }],
            "completedapps": []
        }"#;

        let state: MasterState = serde_json::from_str(body).expect("decode master state");
        assert_eq!(state.activeapps.len(), 1);
        let app = &state.activeapps[0];
        assert_eq!(app.id, "app-20190605145937-0017");
        assert_eq!(app.cores, 8);
        assert_eq!(app.memoryperslave, 1024);
        assert_eq!(app.state, "RUNNING");
    }

    #[test]
    fn test_job_decode_camel_case() {
        let body = r#"[{"jobId": 5, "name": "job-5", "numTasks": 10, "stageIds": [1, 2], "status": "RUNNING"}]"#;
        let jobs: Vec<SparkJob> = serde_json::from_str(body).expect("decode jobs");
        assert_eq!(jobs[0].job_id, 5);
        assert_eq!(jobs[0].num_tasks, 10);
        assert_eq!(jobs[0].stage_ids, vec![1, 2]);
        assert_eq!(jobs[0].num_failed_tasks, 0);
        assert_eq!(jobs[0].submission_time, "");
    }

    #[test]
    fn test_executor_decode_nested_and_gc_time() {
        let body = r#"{
            "id": "driver",
            "hostPort": "10.0.0.1:40000",
            "isActive": true,
            "totalGCTime": 321,
            "maxMemory": 455501414,
            "memoryMetrics": {
                "usedOnHeapStorageMemory": 1000,
                "totalOnHeapStorageMemory": 455501414
            },
            "executorLogs": {"stdout": "http://w/stdout"}
        }"#;
        let exec: SparkExecutor = serde_json::from_str(body).expect("decode executor");
        assert!(exec.is_active);
        assert_eq!(exec.total_gc_time, 321);
        assert_eq!(exec.memory_metrics.used_on_heap_storage_memory, 1000);
        assert_eq!(exec.executor_logs.len(), 1);
    }

    #[test]
    fn test_stream_stats_decode_float() {
        let body = r#"{"batchDuration": 1000, "avgInputRate": 12.5, "numReceivers": 2}"#;
        let stats: SparkStreamStats = serde_json::from_str(body).expect("decode stats");
        assert_eq!(stats.avg_input_rate, 12.5);
        assert_eq!(stats.num_receivers, 2);
    }

    #[test]
    fn test_job_field_table() {
        let kinds = kinds_of(&SparkJob::default());
        assert_eq!(kinds.len(), 16);
        assert_eq!(kinds[0], ("JobID", FieldKind::MetricNumeric));
        assert_eq!(kinds[1], ("Name", FieldKind::TagString));
        assert_eq!(kinds[3], ("StageIds", FieldKind::TagIntList));
    }

    #[test]
    fn test_stage_field_table() {
        let kinds = kinds_of(&SparkStage::default());
        assert_eq!(kinds.len(), 26);
        let tags: Vec<&str> = kinds
            .iter()
            .filter(|(_, k)| k.is_tag())
            .map(|(n, _)| *n)
            .collect();
        assert_eq!(
            tags,
            vec![
                "Status",
                "SubmissionTime",
                "FirstTaskLaunchedTime",
                "Name",
                "SchedulingPool",
                "RddIds"
            ]
        );
    }

    #[test]
    fn test_executor_field_table() {
        let kinds = kinds_of(&SparkExecutor::default());
        assert_eq!(kinds.len(), 22);
        assert!(kinds.contains(&("MemoryMetrics", FieldKind::Nested)));
        assert!(kinds.contains(&("ExecutorLogs", FieldKind::Ignored)));
        assert!(kinds.contains(&("IsBlacklisted", FieldKind::MetricBool)));
    }

    #[test]
    fn test_stream_stats_field_table_all_numeric() {
        let kinds = kinds_of(&SparkStreamStats::default());
        assert_eq!(kinds.len(), 13);
        assert!(kinds.iter().all(|(_, k)| *k == FieldKind::MetricNumeric));
    }
}
