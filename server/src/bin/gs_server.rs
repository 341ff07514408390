// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use gs_server::gs_server::server_main;

fn main() {
    server_main();
}
