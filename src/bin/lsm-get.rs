// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::process::ExitCode;

fn main() -> ExitCode {
    lsm::cli::get_main()
}
