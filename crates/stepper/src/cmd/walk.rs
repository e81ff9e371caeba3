// Stepper - Pipeline Stepping Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Walk command - step from one end of the selection towards the other

use eyre::Result;
use stepper_common::StepType;
use stepper_engine::{FsStore, StepperConfig};

use super::step::{prepare, print_result};
use crate::StepArgs;

/// Print up to `limit` consecutive records, stopping early when the
/// selection runs out or a step does not complete in time.
pub async fn walk(
    store: FsStore,
    config: &StepperConfig,
    backward: bool,
    limit: usize,
    element: Option<&str>,
    args: &StepArgs,
) -> Result<()> {
    let (start, onward) =
        if backward { (StepType::Last, StepType::Backward) } else { (StepType::First, StepType::Forward) };
    let (service, mut request) = prepare(store, config, start, args)?;

    for step in 0..limit {
        let result = service.step(request.clone()).await?;
        if !result.found_record || !result.complete {
            if step == 0 || !result.complete {
                print_result(&result, element, args.json)?;
            }
            break;
        }
        print_result(&result, element, args.json)?;

        // Unique filters remember what they have seen through the returned filter map.
        request = request
            .next(onward, result.step_location)
            .with_filter_map(result.step_filter_map.clone());
    }
    Ok(())
}
