use taxthink_core::types::{Currency, Jurisdiction};

/// Descriptive knowledge baked into the instruction text for one
/// jurisdiction.
#[derive(Clone, Debug)]
pub struct JurisdictionProfile {
    pub tax_system: &'static str,
    pub currency_label: &'static str,
    pub key_areas: &'static str,
    pub common_deductions: &'static str,
    pub compliance_items: &'static str,
    /// Example topics named in the welcome greeting.
    pub welcome_examples: &'static str,
}

static US_PROFILE: JurisdictionProfile = JurisdictionProfile {
    tax_system: "United States federal and state tax system",
    currency_label: "USD",
    key_areas: "federal income tax, state taxes, IRS codes, deductions, credits, retirement accounts (401k, IRA), business entity types (LLC, S-Corp, C-Corp), self-employment tax, estimated quarterly payments",
    common_deductions: "home office, business expenses, equipment depreciation, professional development, business insurance, vehicle expenses, business meals",
    compliance_items: "Form 1040, Schedule C (business), quarterly estimated payments, state filing requirements, business license requirements",
    welcome_examples: "personal income tax, business deductions, retirement planning, state tax considerations",
};

static IN_PROFILE: JurisdictionProfile = JurisdictionProfile {
    tax_system: "Indian tax system including Income Tax Act and GST",
    currency_label: "INR",
    key_areas: "Income Tax Act sections, GST, TDS (Tax Deducted at Source), advance tax, ITR forms, professional tax, business registration, MSME benefits",
    common_deductions: "Section 80C (ELSS, PPF, insurance), Section 80D (health insurance), home loan interest, professional expenses, business equipment",
    compliance_items: "ITR filing, GST returns, TDS compliance, advance tax payments, professional tax registration, business compliance certificates",
    welcome_examples: "Income Tax Act compliance, GST planning, TDS optimization, business registration benefits",
};

pub fn profile(jurisdiction: Jurisdiction) -> &'static JurisdictionProfile {
    match jurisdiction {
        Jurisdiction::Us => &US_PROFILE,
        Jurisdiction::In => &IN_PROFILE,
    }
}

/// Compose the system instruction for a session's jurisdiction and currency,
/// including the JSON reply contract the generator must follow.
pub fn system_prompt(jurisdiction: Jurisdiction, currency: Currency) -> String {
    let p = profile(jurisdiction);

    format!(
        r#"You are TaxThink AI, an expert tax thinking companion specializing in {tax_system}. Your role is to help users think through tax situations systematically by asking contextual questions and providing structured guidance.

CONTEXT: {tax_system} with {currency_label} currency.

KEY EXPERTISE AREAS:
{key_areas}

COMMON DEDUCTIONS & CREDITS:
{common_deductions}

COMPLIANCE REQUIREMENTS:
{compliance_items}

YOUR APPROACH:
1. Ask targeted, contextual questions to gather necessary information
2. Break complex tax situations into manageable categories
3. Provide structured thinking frameworks
4. Identify optimization opportunities
5. Highlight compliance requirements and deadlines
6. Suggest actionable next steps

RESPONSE FORMAT:
Always respond with a JSON object containing:
{{
  "content": "Your main response with structured guidance and questions",
  "thinkingMode": "Current analysis focus (e.g., 'Business Tax Optimization', 'Personal Deduction Planning')",
  "categories": ["relevant tax categories being discussed"],
  "actionItems": ["specific tasks the user should complete"],
  "keyInsights": ["important findings or opportunities identified"],
  "nextQuestions": ["follow-up questions to ask based on user's response"]
}}

Remember to:
- Use {currency_code} currency format
- Reference appropriate {jurisdiction_code} tax codes and forms
- Consider jurisdiction-specific tax planning strategies
- Be professional but conversational
- Focus on practical, actionable guidance"#,
        tax_system = p.tax_system,
        currency_label = p.currency_label,
        key_areas = p.key_areas,
        common_deductions = p.common_deductions,
        compliance_items = p.compliance_items,
        currency_code = currency.code(),
        jurisdiction_code = jurisdiction.to_string().to_uppercase(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_are_jurisdiction_specific() {
        let us = profile(Jurisdiction::Us);
        assert!(us.key_areas.contains("IRS"));
        assert!(us.compliance_items.contains("Form 1040"));
        assert_eq!(us.currency_label, "USD");

        let ind = profile(Jurisdiction::In);
        assert!(ind.tax_system.contains("GST"));
        assert!(ind.common_deductions.contains("Section 80C"));
        assert_eq!(ind.currency_label, "INR");
    }

    #[test]
    fn prompt_embeds_profile_and_contract() {
        let prompt = system_prompt(Jurisdiction::Us, Currency::Usd);
        assert!(prompt.contains("United States federal and state tax system"));
        assert!(prompt.contains("home office"));
        assert!(prompt.contains("\"thinkingMode\""));
        assert!(prompt.contains("\"nextQuestions\""));
        assert!(prompt.contains("Use USD currency format"));
        assert!(prompt.contains("US tax codes and forms"));
    }

    #[test]
    fn prompt_respects_session_currency() {
        // Jurisdiction and currency are configured independently.
        let prompt = system_prompt(Jurisdiction::In, Currency::Inr);
        assert!(prompt.contains("Income Tax Act"));
        assert!(prompt.contains("Use INR currency format"));
        assert!(prompt.contains("IN tax codes and forms"));
    }
}
