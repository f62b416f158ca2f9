//! Crop annotation
//!
//! Attaches the state name and the crops grown in each row's season. The
//! crop list comes from the state's static calendar and is rendered as a
//! `;`-joined string so that it survives CSV output; a season without
//! crops gets an empty string.

use crate::app::models::Season;
use crate::config::StateConfig;
use crate::constants::{CROP_SEPARATOR, columns};
use crate::Result;
use polars::prelude::*;

/// Rendered crop cell for one season
pub fn crop_cell(state: &StateConfig, season: Season) -> String {
    state.crops_for(season).join(CROP_SEPARATOR)
}

/// Add `state` and `crops` columns to a fused table
pub fn annotate_crops(mut frame: DataFrame, state: &StateConfig) -> Result<DataFrame> {
    let crops: Vec<String> = frame
        .column(columns::SEASON)?
        .str()?
        .into_iter()
        .map(|label| {
            label
                .and_then(|label| label.parse::<Season>().ok())
                .map(|season| crop_cell(state, season))
                .unwrap_or_default()
        })
        .collect();
    let states = vec![state.name.as_str(); frame.height()];

    frame.with_column(Column::new(columns::STATE.into(), states))?;
    frame.with_column(Column::new(columns::CROPS.into(), crops))?;
    Ok(frame)
}
