//! H2C 命令码与 C2H 事件码
//!
//! 码值即声明顺序（从 0 开始），与固件命令/事件处理表的下标一致。

bsp::define_codes! {
    /// H2C 命令码
    pub enum H2cCmd {
        ReadMacReg, // 0
        WriteMacReg,
        ReadBbReg,
        WriteBbReg,
        ReadRfReg,
        WriteRfReg, // 5
        ReadEeprom,
        WriteEeprom,
        ReadEfuse,
        WriteEfuse,
        ReadCam, // 10
        WriteCam,
        SetBcnItv,
        SetMbidCfg,
        JoinBss, // 14
        DisConnect, // 15
        CreateBss,
        SetOpMode,
        SiteSurvey, // 18
        SetAuth,
        SetKey, // 20
        SetStaKey,
        SetAssocSta,
        DelAssocSta,
        SetStaPwrState,
        SetBasicRate, // 25
        GetBasicRate,
        SetDataRate,
        GetDataRate,
        SetPhyInfo,
        GetPhyInfo, // 30
        SetPhy,
        GetPhy,
        ReadRssi,
        ReadGain,
        SetAtim, // 35
        SetPwrMode,
        JoinBssRpt,
        SetRaTable,
        GetRaTable,
        GetCcxReport, // 40
        GetDtmReport,
        GetTxRateStatistics,
        SetUsbSuspend,
        SetH2cLbk,
        AddBaReq, // 45
        SetChannel,
        SetTxPower,
        SwitchAntenna,
        SetCrystalCap,
        SetSingleCarrierTx, // 50
        SetSingleToneTx,
        SetCarrierSuppressionTx,
        SetContinuousTx,
        SwitchBandwidth,
        TxBeacon, // 55
        SetMlmeEvt,
        SetDrvExtra,
        SetH2cMsg,
        SetChannelPlan, // 59
        LedBlink, // 60
        SetChannelSwitch,
        Tdls,
        P2p, // 63
    }
}

impl H2cCmd {
    /// 固件以响应事件回送结果的命令（读寄存器 / 查询类，以及需要 CAM id 的站点操作）
    pub fn expects_rsp(self) -> bool {
        matches!(
            self,
            H2cCmd::ReadMacReg
                | H2cCmd::ReadBbReg
                | H2cCmd::ReadRfReg
                | H2cCmd::ReadEeprom
                | H2cCmd::ReadEfuse
                | H2cCmd::ReadCam
                | H2cCmd::SetStaKey
                | H2cCmd::SetAssocSta
                | H2cCmd::GetBasicRate
                | H2cCmd::GetDataRate
                | H2cCmd::GetPhyInfo
                | H2cCmd::GetPhy
                | H2cCmd::GetRaTable
                | H2cCmd::GetCcxReport
                | H2cCmd::GetDtmReport
                | H2cCmd::GetTxRateStatistics
        )
    }
}

bsp::define_codes! {
    /// C2H 事件码
    pub enum C2hEvt {
        ReadMacReg, // 0
        ReadBbReg,
        ReadRfReg,
        ReadEeprom,
        ReadEfuse,
        ReadCam, // 5
        GetBasicRate,
        GetDataRate,
        Survey, // 8
        SurveyDone,
        JoinBss, // 10
        AddSta,
        DelSta,
        AtimDone,
        TxReport,
        CcxReport, // 15
        DtmReport,
        TxRateStatistics,
        C2hLbk,
        FwDbg,
        C2hFeedback, // 20
        AddBa,
        C2hBcn,
        ReportPwrState,
        CloseRf,
        Wmm, // 25
        /// H2C 命令响应通道
        H2cRsp,
    }
}
