//! The canonical default site-content document.
//!
//! Every section is fully populated so a backfill never leaves a broken,
//! empty section on the page.

use std::path::Path;

use serde_json::json;

use crate::error::{io_err, SyncError};
use crate::tree::Node;

/// Built-in default document.
pub fn site_content() -> Node {
    Node::from(json!({
        "hero": {
            "title": "Learn at your own pace",
            "subtitle": "Structured courses, hands-on lessons, real feedback.",
            "ctaText": "Browse courses",
            "ctaLink": "/courses",
            "image": "/images/hero.jpg"
        },
        "features": {
            "heading": "Why learn with us",
            "items": [
                {"id": 1, "title": "Expert instructors", "description": "Courses built by practitioners."},
                {"id": 2, "title": "Lifetime access", "description": "Revisit any lesson, any time."},
                {"id": 3, "title": "Certificates", "description": "Show what you have learned."}
            ]
        },
        "gallery": {
            "heading": "Inside the classroom",
            "images": [
                {"id": 1, "url": "/images/gallery-1.jpg", "alt": "Students at work"},
                {"id": 2, "url": "/images/gallery-2.jpg", "alt": "Live session"}
            ]
        },
        "faq": {
            "heading": "Frequently asked questions",
            "faqs": [
                {"id": 1, "question": "How do I enroll?", "answer": "Pick a course and check out.", "order": 1},
                {"id": 2, "question": "Can I get a refund?", "answer": "Within 14 days of purchase.", "order": 2}
            ]
        },
        "reviews": {
            "heading": "What students say",
            "reviews": [
                {"id": 1, "name": "A. Student", "rating": 5, "text": "Clear and practical.", "displayOrder": 1}
            ]
        },
        "menu": {
            "items": [
                {"id": 1, "label": "Home", "href": "/"},
                {"id": 2, "label": "Courses", "href": "/courses"},
                {"id": 3, "label": "Contact", "href": "/contact"}
            ]
        },
        "footer": {
            "copyright": "All rights reserved.",
            "links": [
                {"id": 1, "label": "Privacy", "href": "/privacy"},
                {"id": 2, "label": "Terms", "href": "/terms"}
            ],
            "social": {
                "twitter": "",
                "youtube": ""
            }
        }
    }))
}

/// The configured defaults file, or [`site_content`] when none is set.
pub fn load(path: Option<&Path>) -> Result<Node, SyncError> {
    let Some(path) = path else {
        return Ok(site_content());
    };
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let value: serde_json::Value = serde_json::from_str(&contents)?;
    Ok(Node::from(value))
}
