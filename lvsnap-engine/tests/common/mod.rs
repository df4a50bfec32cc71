// SPDX-License-Identifier: GPL-3.0-only

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use lvsnap_sys::{CommandExecutor, CommandOutput, LvmTool, Result, SysError};

pub const VGS: &str = "  vg0\t10737418240B\t2147483648B\n";

pub const LVS_BEFORE: &str = "  vg0\troot\t4294967296B\t\t\t-wi-ao----\n  \
                              vg0\thome\t2147483648B\t\t\t-wi-ao----\n  \
                              vg0\thome_snap\t1073741824B\thome\t45.00\tswi-a-s---\n";

pub const LVS_WITH_NIGHTLY: &str = "  vg0\troot\t4294967296B\t\t\t-wi-ao----\n  \
                                    vg0\thome\t2147483648B\t\t\t-wi-ao----\n  \
                                    vg0\thome_snap\t1073741824B\thome\t45.00\tswi-a-s---\n  \
                                    vg0\tnightly\t536870912B\troot\t\tswi-a-s---\n";

pub const LVS_AFTER_DELETE: &str = "  vg0\troot\t4294967296B\t\t\t-wi-ao----\n  \
                                    vg0\thome\t2147483648B\t\t\t-wi-ao----\n";

/// Executor returning queued responses per tool and recording every call.
#[derive(Default)]
pub struct FakeExecutor {
    responses: RefCell<HashMap<LvmTool, VecDeque<Result<CommandOutput>>>>,
    calls: RefCell<Vec<(LvmTool, Vec<String>)>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, tool: LvmTool, stdout: &str) -> &Self {
        self.push(tool, Ok(CommandOutput::from_stdout(stdout)))
    }

    pub fn fail(&self, tool: LvmTool, error: SysError) -> &Self {
        self.push(tool, Err(error))
    }

    /// Queue one `vgs` + `lvs` pass.
    pub fn state(&self, vgs: &str, lvs: &str) -> &Self {
        self.respond(LvmTool::Vgs, vgs).respond(LvmTool::Lvs, lvs)
    }

    fn push(&self, tool: LvmTool, response: Result<CommandOutput>) -> &Self {
        self.responses
            .borrow_mut()
            .entry(tool)
            .or_default()
            .push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<(LvmTool, Vec<String>)> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn calls_to(&self, tool: LvmTool) -> Vec<Vec<String>> {
        self.calls
            .borrow()
            .iter()
            .filter(|(called, _)| *called == tool)
            .map(|(_, args)| args.clone())
            .collect()
    }
}

impl CommandExecutor for FakeExecutor {
    fn run(&self, tool: LvmTool, args: &[String]) -> Result<CommandOutput> {
        self.calls.borrow_mut().push((tool, args.to_vec()));
        self.responses
            .borrow_mut()
            .get_mut(&tool)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| panic!("unexpected call to {tool} {args:?}"))
    }
}
