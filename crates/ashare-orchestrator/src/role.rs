/// Distinct agent roles in the graph. Each carries its own system prompt and
/// recursion ceiling; analyst roles additionally name the `RunState` field
/// their report is written into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentRole {
    MarketAnalyst,
    SentimentAnalyst,
    NewsAnalyst,
    FundamentalsAnalyst,
    ChinaMarketAnalyst,
    BullResearcher,
    BearResearcher,
    ResearchManager,
    Trader,
    MomentumDebater,
    ValueDebater,
    RiskManagerDebater,
    RiskJudge,
    ConsolidationAnalyst,
}

/// Recursion-limit tier per §4.3: quick=5, default=10, analysis=20.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecursionTier {
    Quick,
    Default,
    Analysis,
}

impl RecursionTier {
    pub fn limit(self) -> usize {
        match self {
            RecursionTier::Quick => 5,
            RecursionTier::Default => 10,
            RecursionTier::Analysis => 20,
        }
    }
}

impl AgentRole {
    pub fn recursion_tier(self) -> RecursionTier {
        match self {
            AgentRole::MarketAnalyst
            | AgentRole::SentimentAnalyst
            | AgentRole::NewsAnalyst
            | AgentRole::FundamentalsAnalyst
            | AgentRole::ChinaMarketAnalyst => RecursionTier::Analysis,
            AgentRole::BullResearcher
            | AgentRole::BearResearcher
            | AgentRole::MomentumDebater
            | AgentRole::ValueDebater
            | AgentRole::RiskManagerDebater => RecursionTier::Quick,
            AgentRole::ResearchManager
            | AgentRole::Trader
            | AgentRole::RiskJudge
            | AgentRole::ConsolidationAnalyst => RecursionTier::Default,
        }
    }

    pub fn recursion_limit(self) -> usize {
        self.recursion_tier().limit()
    }

    pub fn name(self) -> &'static str {
        match self {
            AgentRole::MarketAnalyst => "market_analyst",
            AgentRole::SentimentAnalyst => "sentiment_analyst",
            AgentRole::NewsAnalyst => "news_analyst",
            AgentRole::FundamentalsAnalyst => "fundamentals_analyst",
            AgentRole::ChinaMarketAnalyst => "china_market_analyst",
            AgentRole::BullResearcher => "bull_researcher",
            AgentRole::BearResearcher => "bear_researcher",
            AgentRole::ResearchManager => "research_manager",
            AgentRole::Trader => "trader",
            AgentRole::MomentumDebater => "momentum_debater",
            AgentRole::ValueDebater => "value_debater",
            AgentRole::RiskManagerDebater => "risk_manager_debater",
            AgentRole::RiskJudge => "risk_judge",
            AgentRole::ConsolidationAnalyst => "consolidation_analyst",
        }
    }

    /// Static role system prompt, parameterised by `{today, ticker,
    /// current_date, tool_names}`.
    pub fn system_prompt_template(self) -> &'static str {
        match self {
            AgentRole::MarketAnalyst => {
                "你是一名技术面分析师。今天是{current_date}，标的为{ticker}。\
                 使用可用工具（{tool_names}）获取行情数据，基于均线、量价关系和趋势结构给出技术面判断。"
            }
            AgentRole::SentimentAnalyst => {
                "你是一名市场情绪分析师。今天是{current_date}，标的为{ticker}。\
                 使用可用工具（{tool_names}）评估当前市场情绪倾向。"
            }
            AgentRole::NewsAnalyst => {
                "你是一名消息面分析师。今天是{current_date}，标的为{ticker}。\
                 使用可用工具（{tool_names}）检索近期新闻与公告，评估对股价的潜在影响。"
            }
            AgentRole::FundamentalsAnalyst => {
                "你是一名基本面分析师。今天是{current_date}，标的为{ticker}。\
                 使用可用工具（{tool_names}）获取财务与估值数据，给出盈亏比、目标价和估值区间判断。"
            }
            AgentRole::ChinaMarketAnalyst => {
                "你是一名A股市场环境分析师。今天是{current_date}，标的为{ticker}。\
                 使用可用工具（{tool_names}）评估当前市场整体风格与情绪状态。"
            }
            AgentRole::BullResearcher => {
                "你是多头研究员，代表看多立场。今天是{current_date}，标的为{ticker}。\
                 基于四份分析师报告和历史经验提出论点，并逐一回应空方提出的必答项。"
            }
            AgentRole::BearResearcher => {
                "你是空头研究员，代表看空立场。今天是{current_date}，标的为{ticker}。\
                 基于四份分析师报告和历史经验提出论点，并逐一回应多方提出的必答项。"
            }
            AgentRole::ResearchManager => {
                "你是研究主管，负责裁决多空辩论。今天是{current_date}，标的为{ticker}。\
                 综合双方论点给出最终投资建议和裁决理由。"
            }
            AgentRole::Trader => {
                "你是交易员，基于研究主管的裁决和全部分析师报告制定交易计划。今天是{current_date}，标的为{ticker}。"
            }
            AgentRole::MomentumDebater => {
                "你是风险委员会的激进/动量代表。今天是{current_date}，标的为{ticker}。\
                 评估交易计划的上行潜力，并回应其他委员的必答项。"
            }
            AgentRole::ValueDebater => {
                "你是风险委员会的价值/保守代表。今天是{current_date}，标的为{ticker}。\
                 评估交易计划的下行风险，并回应其他委员的必答项。"
            }
            AgentRole::RiskManagerDebater => {
                "你是风险委员会的风险经理代表。今天是{current_date}，标的为{ticker}。\
                 权衡动量与价值两方观点，聚焦仓位与止损纪律。"
            }
            AgentRole::RiskJudge => {
                "你是风险委员会主席，负责裁决最终风险决策。今天是{current_date}，标的为{ticker}。"
            }
            AgentRole::ConsolidationAnalyst => {
                "你是首席分析师，负责撰写最终综合报告。今天是{current_date}，标的为{ticker}。\
                 整合全部分析师报告、投资计划、交易计划与最终决策，按既定结构输出。"
            }
        }
    }

    pub fn render_system_prompt(self, today: &str, ticker: &str, tool_names: &str) -> String {
        self.system_prompt_template()
            .replace("{current_date}", today)
            .replace("{today}", today)
            .replace("{ticker}", ticker)
            .replace("{tool_names}", tool_names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyst_roles_get_analysis_tier() {
        assert_eq!(AgentRole::MarketAnalyst.recursion_limit(), 20);
        assert_eq!(AgentRole::FundamentalsAnalyst.recursion_limit(), 20);
    }

    #[test]
    fn debaters_get_quick_tier() {
        assert_eq!(AgentRole::BullResearcher.recursion_limit(), 5);
        assert_eq!(AgentRole::MomentumDebater.recursion_limit(), 5);
    }

    #[test]
    fn judges_get_default_tier() {
        assert_eq!(AgentRole::ResearchManager.recursion_limit(), 10);
        assert_eq!(AgentRole::RiskJudge.recursion_limit(), 10);
    }

    #[test]
    fn prompt_renders_placeholders() {
        let rendered = AgentRole::MarketAnalyst.render_system_prompt("2024-06-01", "600036", "get_market_data");
        assert!(rendered.contains("2024-06-01"));
        assert!(rendered.contains("600036"));
        assert!(rendered.contains("get_market_data"));
    }
}
