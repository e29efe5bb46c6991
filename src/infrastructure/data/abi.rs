// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Contract bindings used by the rebalance pipeline.
//!
//! `RebalanceRouter` is the agent contract: it pulls tokens from the owner,
//! runs each call in order and sends any balance of `tokensReturn` back to
//! the caller before returning.

use alloy::sol;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    #[sol(rpc)]
    contract ERC20 {
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function transferFrom(address from, address to, uint256 amount) external returns (bool);
    }

    #[derive(Debug, PartialEq, Eq)]
    #[sol(rpc)]
    contract ERC4626Vault {
        function asset() external view returns (address);
        function balanceOf(address owner) external view returns (uint256);
        function previewRedeem(uint256 shares) external view returns (uint256);
        function previewWithdraw(uint256 assets) external view returns (uint256);
        function deposit(uint256 assets, address receiver) external returns (uint256 shares);
        function redeem(uint256 shares, address receiver, address owner) external returns (uint256 assets);
    }

    #[derive(Debug, PartialEq, Eq)]
    #[sol(rpc)]
    contract RebalanceRouter {
        struct RouterCall {
            address target;
            uint256 value;
            bytes data;
        }

        function execute(RouterCall[] calldata calls, address[] calldata tokensReturn)
            external
            payable
            returns (bool success);

        error CallFailed(uint256 index, bytes reason);
        error OnlyOwner();
    }

    #[derive(Debug, PartialEq, Eq)]
    #[sol(rpc)]
    contract UniV2Router {
        function swapExactTokensForTokens(uint256 amountIn, uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) returns (uint256[] memory amounts);
        function getAmountsOut(uint256 amountIn, address[] calldata path) external view returns (uint256[] memory amounts);
    }
}
