//! Target Discovery
//!
//! Walks the paginated "install on" listing and yields one
//! [`TargetDescriptor`] per row that is not already in the run's desired
//! state. Pages are fetched lazily, one at a time and in increasing order,
//! only when the previous page's targets have been consumed.
//!
//! The cursor is finite and non-restartable: it ends once the page count
//! reported by the first page is reached. Dropping it mid-way cancels
//! discovery without fetching further pages.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::document::{first_within, require, selector, Document};
use crate::error::{DiscoveryError, ParseError};
use crate::schema::{ListingSchema, UiSchema};
use crate::session::Session;
use crate::transport::Transport;
use crate::types::{Mode, TargetDescriptor, TargetState};

const FOLDER: &str = "organization-data";

/// One parsed listing page
#[derive(Debug, PartialEq, Eq)]
pub struct ListingPage {
    /// Page count announced by the pagination marker (1 when absent)
    pub total_pages: u32,
    /// Every row on the page, unfiltered
    pub rows: Vec<TargetDescriptor>,
}

/// Parse a listing page. A malformed row fails the whole page.
pub fn parse_listing(body: &str, schema: &ListingSchema) -> Result<ListingPage, ParseError> {
    let doc = Document::parse(body);
    let step = schema.step;

    let total_pages = match doc.first(step, schema.pagination)? {
        None => 1,
        Some(current) => {
            let raw = require(
                current.value().attr(schema.total_pages_attr),
                step,
                "total pages",
            )?;
            raw.trim()
                .parse::<u32>()
                .map_err(|_| ParseError::Invalid {
                    step,
                    marker: "total pages",
                    value: raw.to_string(),
                })?
                .max(1)
        }
    };

    let container = require(doc.first(step, schema.container)?, step, "listing container")?;

    let row_selector = selector(step, schema.row)?;
    let mut rows = Vec::new();
    for row in container.select(&row_selector) {
        let avatar = require(first_within(row, step, schema.row_avatar)?, step, "row avatar")?;
        let name = require(avatar.value().attr("alt"), step, "row name")?
            .trim()
            .trim_start_matches('@')
            .to_string();
        let reference = require(row.value().attr("href"), step, "row link")?.to_string();

        let status = require(first_within(row, step, schema.row_status)?, step, "row status")?;
        let label = require(status.value().attr(schema.status_attr), step, "row status label")?;
        let current_state = if label.to_lowercase().contains(schema.installed_marker) {
            TargetState::Installed
        } else {
            TargetState::NotInstalled
        };

        rows.push(TargetDescriptor {
            name,
            reference,
            current_state,
        });
    }

    Ok(ListingPage { total_pages, rows })
}

/// Lazy cursor over discoverable targets
pub struct TargetCursor {
    listing_path: String,
    mode: Mode,
    schema: ListingSchema,
    next_page: u32,
    total_pages: Option<u32>,
    buffered: VecDeque<TargetDescriptor>,
    pages_fetched: u32,
    skipped: usize,
    failed: bool,
}

impl TargetCursor {
    pub fn new(app_name: &str, mode: Mode, schema: &UiSchema) -> Self {
        Self {
            listing_path: UiSchema::listing_path(app_name),
            mode,
            schema: schema.listing.clone(),
            next_page: 1,
            total_pages: None,
            buffered: VecDeque::new(),
            pages_fetched: 0,
            skipped: 0,
            failed: false,
        }
    }

    /// Listing pages fetched so far
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Rows filtered out because they are already in the desired state
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn exhausted(&self) -> bool {
        self.failed || matches!(self.total_pages, Some(total) if self.next_page > total)
    }

    /// Next target, fetching the following page when the buffer runs dry.
    ///
    /// `Ok(None)` once every page has been consumed. After an error the
    /// cursor yields nothing further.
    pub async fn next<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<Option<TargetDescriptor>, DiscoveryError> {
        loop {
            if let Some(target) = self.buffered.pop_front() {
                return Ok(Some(target));
            }
            if self.exhausted() {
                return Ok(None);
            }
            if let Err(e) = self.fetch_next_page(session).await {
                self.failed = true;
                return Err(e);
            }
        }
    }

    async fn fetch_next_page<T: Transport>(&mut self, session: &mut Session<T>) -> Result<(), DiscoveryError> {
        let page_number = self.next_page;
        let path = if page_number == 1 {
            self.listing_path.clone()
        } else {
            format!("{}?page={}", self.listing_path, page_number)
        };

        let page = session
            .get(FOLDER, &format!("page-{}", page_number), &path)
            .await
            .map_err(|source| DiscoveryError::Transport {
                page: page_number,
                source,
            })?;

        let listing = parse_listing(&page.body, &self.schema).map_err(|source| DiscoveryError::Parse {
            page: page_number,
            source,
        })?;

        // The first page's marker is authoritative for the run
        let total = *self.total_pages.get_or_insert(listing.total_pages);
        self.next_page += 1;
        self.pages_fetched += 1;
        debug!(page = page_number, total, rows = listing.rows.len(), "Fetched listing page");

        let desired = self.mode.desired_state();
        for row in listing.rows {
            if row.current_state == desired {
                info!(account = %row.name, mode = %self.mode, "Already in desired state, skipping");
                self.skipped += 1;
                continue;
            }
            self.buffered.push_back(row);
        }

        Ok(())
    }
}
