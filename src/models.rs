//! Core data model: jobs, collection items, wanted items

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Ripping,
    Ripped,
    Encoding,
    Encoded,
    Identifying,
    Review,
    Moving,
    Complete,
    Failed,
    Archived,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Ripping => "ripping",
            JobStatus::Ripped => "ripped",
            JobStatus::Encoding => "encoding",
            JobStatus::Encoded => "encoded",
            JobStatus::Identifying => "identifying",
            JobStatus::Review => "review",
            JobStatus::Moving => "moving",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
            JobStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<JobStatus> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "ripping" => Some(JobStatus::Ripping),
            "ripped" => Some(JobStatus::Ripped),
            "encoding" => Some(JobStatus::Encoding),
            "encoded" => Some(JobStatus::Encoded),
            "identifying" => Some(JobStatus::Identifying),
            "review" => Some(JobStatus::Review),
            "moving" => Some(JobStatus::Moving),
            "complete" => Some(JobStatus::Complete),
            "failed" => Some(JobStatus::Failed),
            "archived" => Some(JobStatus::Archived),
            _ => None,
        }
    }

    /// Terminal statuses never advance through the pipeline again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Complete | JobStatus::Failed | JobStatus::Archived
        )
    }

    /// Whether `self -> to` is a legal status transition.
    ///
    /// `encoding -> ripped` and `identifying -> encoded` are the two recovery
    /// edges used by cancellation checkpointing and oversight repair; they are
    /// the only edges that move a job backwards.
    pub fn can_transition(self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Pending, Ripping)
                | (Pending, Failed)
                | (Ripping, Ripped)
                | (Ripping, Failed)
                | (Ripped, Encoding)
                | (Ripped, Failed)
                | (Encoding, Encoded)
                | (Encoding, Failed)
                | (Encoding, Ripped)
                | (Encoded, Identifying)
                | (Encoded, Failed)
                | (Identifying, Review)
                | (Identifying, Moving)
                | (Identifying, Failed)
                | (Identifying, Encoded)
                | (Review, Moving)
                | (Review, Failed)
                | (Moving, Complete)
                | (Moving, Failed)
                | (Complete, Archived)
                | (Failed, Archived)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of content carried by a disc
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Unknown,
    Movie,
    TvSeason,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Unknown => "unknown",
            ContentType::Movie => "movie",
            ContentType::TvSeason => "tv_season",
        }
    }

    pub fn parse(s: &str) -> Option<ContentType> {
        match s {
            "unknown" => Some(ContentType::Unknown),
            "movie" => Some(ContentType::Movie),
            "tv_season" => Some(ContentType::TvSeason),
            _ => None,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which artifact path field to set on a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathField {
    Rip,
    Encode,
    Final,
}

impl PathField {
    pub fn column(&self) -> &'static str {
        match self {
            PathField::Rip => "rip_path",
            PathField::Encode => "encode_path",
            PathField::Final => "final_path",
        }
    }
}

/// One job per inserted disc
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: i64,
    pub drive_id: String,
    pub disc_label: String,
    pub content_type: ContentType,
    pub status: JobStatus,
    pub identified_title: Option<String>,
    pub identified_year: Option<i32>,
    pub catalog_id: Option<i64>,
    pub confidence: Option<f64>,
    pub poster_ref: Option<String>,
    pub rip_path: Option<String>,
    pub encode_path: Option<String>,
    pub final_path: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A successfully filed title
#[derive(Debug, Clone, Serialize)]
pub struct CollectionItem {
    pub id: i64,
    pub title: String,
    pub year: Option<i32>,
    pub content_type: ContentType,
    pub catalog_id: Option<i64>,
    pub file_path: String,
    pub added_at: DateTime<Utc>,
}

/// A user-maintained wishlist entry, independent of jobs
#[derive(Debug, Clone, Serialize)]
pub struct WantedItem {
    pub id: i64,
    pub title: String,
    pub year: Option<i32>,
    pub content_type: ContentType,
    pub catalog_id: Option<i64>,
    pub poster_ref: Option<String>,
    pub notes: Option<String>,
    pub added_at: DateTime<Utc>,
}
