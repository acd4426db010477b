// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module

mod fold_and_version;
mod subject_sanitization;
