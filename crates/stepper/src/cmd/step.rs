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

//! Step command - run a single step request

use std::sync::Arc;

use eyre::Result;
use stepper_common::{StepLocation, StepRequest, StepResult, StepType};
use stepper_engine::{
    FsStore, MemoryPipelineStore, PipelineDefinition, StepperConfig, SteppingService,
    TextPipelineFactory,
};

use crate::{utils, StepArgs};

/// Session used by one-shot invocations.
const CLI_SESSION: &str = "cli";

/// Build a service over `store` that knows the pipeline in `args`, and the
/// request template every step of this invocation starts from.
pub fn prepare(
    store: FsStore,
    config: &StepperConfig,
    step_type: StepType,
    args: &StepArgs,
) -> Result<(SteppingService, StepRequest)> {
    let definition = PipelineDefinition::load(&args.pipeline)?;
    tracing::info!("Stepping with pipeline '{}'", definition.name);

    let pipelines = MemoryPipelineStore::new();
    let pipeline = pipelines.add(definition);
    let service = SteppingService::new(
        Arc::new(store),
        Arc::new(pipelines),
        Arc::new(TextPipelineFactory),
        config,
    );

    let mut request = StepRequest::new(CLI_SESSION, step_type, pipeline)
        .with_criteria(args.selection.criteria())
        .with_filter_map(utils::filter_map(&args.filters)?)
        .with_timeout_ms(args.timeout_ms);
    if let Some(child) = &args.child {
        request = request.with_child_stream_type(child);
    }
    Ok((service, request))
}

/// Print a result in the requested format.
pub fn print_result(result: &StepResult, element: Option<&str>, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(result)?);
    } else {
        print!("{}", utils::render_result(result, element));
    }
    Ok(())
}

/// Take one step and print where it landed.
pub async fn take_step(
    store: FsStore,
    config: &StepperConfig,
    step_type: StepType,
    at: Option<StepLocation>,
    args: &StepArgs,
) -> Result<()> {
    let (service, mut request) = prepare(store, config, step_type, args)?;
    if let Some(location) = at {
        request = request.at(location);
    }

    let result = service.step(request).await?;
    print_result(&result, None, args.json)
}
