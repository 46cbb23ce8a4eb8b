// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Page shells. Rendering happens client-side; these only give the guard
//! something to front.

use axum::{extract::Path, response::Html};

pub async fn login() -> Html<&'static str> {
    Html("<!doctype html><title>Food Rescue Rewards</title><main id=\"login\"></main>")
}

pub async fn dashboard() -> Html<&'static str> {
    Html("<!doctype html><title>Dashboard</title><main id=\"dashboard\"></main>")
}

pub async fn dashboard_section(Path(section): Path<String>) -> Html<String> {
    let section: String = section
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_'))
        .collect();
    Html(format!(
        "<!doctype html><title>Dashboard</title><main id=\"dashboard\" data-section=\"{section}\"></main>"
    ))
}
