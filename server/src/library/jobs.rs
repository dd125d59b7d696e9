//! Background scan jobs
//!
//! A scan is started from the API and runs on its own task; clients poll
//! its status by id.

use super::scanner::{scan_namespace, ScanSummary};
use super::Source;
use crate::db::DbPool;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Finished jobs kept for polling
const MAX_FINISHED_JOBS: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ScanStatus {
    Running,
    Done { indexed: usize, pruned: u64 },
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanJob {
    pub id: Uuid,
    pub source_key: String,
    pub root_folder: String,
    pub started_at: i64,
    #[serde(flatten)]
    pub status: ScanStatus,
}

#[derive(Clone, Default)]
pub struct ScanJobs {
    jobs: Arc<Mutex<HashMap<Uuid, ScanJob>>>,
}

impl ScanJobs {
    /// Register a job and run it in the background
    pub fn start(&self, pool: DbPool, source: Source, root_folder: String) -> ScanJob {
        let job = ScanJob {
            id: Uuid::new_v4(),
            source_key: source.key.clone(),
            root_folder: root_folder.clone(),
            started_at: chrono::Utc::now().timestamp_millis(),
            status: ScanStatus::Running,
        };
        self.insert(job.clone());

        let jobs = self.clone();
        let id = job.id;
        tokio::spawn(async move {
            let status = match scan_namespace(&pool, &source, &root_folder).await {
                Ok(ScanSummary { indexed, pruned }) => ScanStatus::Done { indexed, pruned },
                Err(e) => {
                    tracing::warn!(source = %source.key, root = %root_folder, "scan failed: {}", e);
                    ScanStatus::Failed {
                        message: e.to_string(),
                    }
                }
            };
            jobs.finish(id, status);
        });

        job
    }

    pub fn get(&self, id: Uuid) -> Option<ScanJob> {
        self.lock().get(&id).cloned()
    }

    fn insert(&self, job: ScanJob) {
        let mut jobs = self.lock();
        if jobs.len() >= MAX_FINISHED_JOBS {
            let oldest = jobs
                .values()
                .filter(|j| j.status != ScanStatus::Running)
                .min_by_key(|j| j.started_at)
                .map(|j| j.id);
            if let Some(oldest) = oldest {
                jobs.remove(&oldest);
            }
        }
        jobs.insert(job.id, job);
    }

    fn finish(&self, id: Uuid, status: ScanStatus) {
        if let Some(job) = self.lock().get_mut(&id) {
            job.status = status;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, ScanJob>> {
        // A poisoned map only ever holds plain status values
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::MediaKind;
    use std::time::Duration;

    async fn wait_done(jobs: &ScanJobs, id: Uuid) -> ScanJob {
        for _ in 0..100 {
            let job = jobs.get(id).unwrap();
            if job.status != ScanStatus::Running {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("scan job did not finish");
    }

    #[tokio::test]
    async fn test_job_reports_summary() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("Album")).unwrap();
        std::fs::write(temp.path().join("Album/01.mp3"), b"x").unwrap();

        let pool = crate::db::memory_pool().await;
        let jobs = ScanJobs::default();
        let source = Source {
            key: "M_SONGS".into(),
            kind: MediaKind::Music,
            path: temp.path().to_path_buf(),
        };

        let job = jobs.start(pool, source, String::new());
        let done = wait_done(&jobs, job.id).await;
        assert_eq!(done.status, ScanStatus::Done { indexed: 2, pruned: 0 });
    }

    #[tokio::test]
    async fn test_job_reports_failure() {
        let pool = crate::db::memory_pool().await;
        let jobs = ScanJobs::default();
        let source = Source {
            key: "V_GONE".into(),
            kind: MediaKind::Movie,
            path: "/definitely/not/here".into(),
        };

        let job = jobs.start(pool, source, String::new());
        let done = wait_done(&jobs, job.id).await;
        assert!(matches!(done.status, ScanStatus::Failed { .. }));
    }

    #[test]
    fn test_status_json_shape() {
        let json = serde_json::to_value(ScanStatus::Done { indexed: 3, pruned: 1 }).unwrap();
        assert_eq!(json["state"], "done");
        assert_eq!(json["indexed"], 3);
    }

    #[test]
    fn test_job_json_is_camel_case() {
        let job = ScanJob {
            id: Uuid::nil(),
            source_key: "ROOT_A".into(),
            root_folder: "Shelf".into(),
            started_at: 7,
            status: ScanStatus::Failed {
                message: "gone".into(),
            },
        };
        let json = serde_json::to_value(job).unwrap();
        assert_eq!(json["sourceKey"], "ROOT_A");
        assert_eq!(json["rootFolder"], "Shelf");
        assert_eq!(json["startedAt"], 7);
        assert_eq!(json["state"], "failed");
        assert_eq!(json["message"], "gone");
    }
}
