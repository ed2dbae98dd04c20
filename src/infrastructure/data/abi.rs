// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IUniverse {
        function getDisputeRoundDurationInSeconds() external view returns (uint256);
    }

    #[sol(rpc)]
    interface IMarket {
        function getUniverse() external view returns (address);
        function getNumberOfOutcomes() external view returns (uint256);
        function getNumTicks() external view returns (uint256);
        function getFeeWindow() external view returns (address);
        function getNumParticipants() external view returns (uint256);
        function getParticipantStake() external view returns (uint256);
        function getWinningReportingParticipant() external view returns (address);
        function derivePayoutDistributionHash(uint256[] payoutNumerators, bool invalid) external view returns (bytes32);
        function getCrowdsourcer(bytes32 payoutDistributionHash) external view returns (address);
    }

    #[sol(rpc)]
    interface IReportingParticipant {
        function getPayoutDistributionHash() external view returns (bytes32);
        function getStake() external view returns (uint256);
    }

    #[sol(rpc)]
    interface IFeeWindow {
        function getEndTime() external view returns (uint256);
    }

    #[sol(rpc)]
    interface ICrowdsourcerFactory {
        function findCrowdsourcer(
            uint256 feeWindowId,
            uint256 startIndex,
            uint256 minFeesInAttoRep,
            address[] calldata exclude
        ) external view returns (uint256 foundIndex, address crowdsourcer);
    }

    #[sol(rpc)]
    interface ICrowdsourcer {
        function getDisputer() external view returns (address);
        function getDisputerParams() external view returns (
            address market,
            uint256 feeWindowId,
            uint256[] memory payoutNumerators,
            bool invalid
        );
        function getTargetRound() external view returns (uint256);
        function getAvailableRep() external view returns (uint256);
        function getProjectedFees(uint256 contribution) external view returns (uint256);
        function isFeesCollected() external view returns (bool);
        function withdrawFees() external;
    }

    #[sol(rpc)]
    interface IDisputer {
        function hasDisputed() external view returns (bool);
        function getFeeReceiver() external view returns (address);
        function dispute(address feeReceiver) external;
    }
}
