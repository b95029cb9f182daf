// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Crowdfunding contract bindings.

use alloy::sol;

// Only the view functions the gateway reads.
sol! {
    #[sol(rpc)]
    interface ICrowdfund {
        struct Project {
            address owner;
            uint256 goal;
            uint256 pledged;
            uint64 deadline;
            bool claimed;
        }

        function getProject(uint256 projectId) external view returns (Project memory);
    }
}
