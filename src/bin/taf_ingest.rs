// wx_ingest - Aviation weather ingestion orchestrator
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use std::error::Error;
use std::sync::Arc;

use wx_ingest::cli::{self, IngestArgs};
use wx_ingest::orchestrator::NoaaSourceAdapter;
use wx_ingest::parser::RegexTafParser;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    cli::run(
        IngestArgs::parse_for("taf_ingest"),
        "taf",
        Arc::new(RegexTafParser),
        NoaaSourceAdapter::taf,
    )
    .await
}
