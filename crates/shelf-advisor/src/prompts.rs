//! Prompt templates and fixed response texts

/// System role for filter translation
pub(crate) const FILTER_SYSTEM: &str =
    "You are a MongoDB query expert. Convert natural language to MongoDB filters and return only JSON objects.";

/// Filter translation prompt with few-shot examples
pub(crate) fn filter_prompt(question: &str) -> String {
    format!(
        r#"You are an expert in converting natural language questions about a grocery store dataset into MongoDB query filters over the products collection.

Given a user's question about their store, generate ONLY the filter object in JSON format without any explanation.

Examples:
- "list categories available" -> {{"status": "APPROVED", "stage": "ACTIVATE"}}
- "show expensive products" -> {{"status": "APPROVED", "offerPrice": {{"$gt": 500}}}}
- "products under 100 rupees" -> {{"status": "APPROVED", "offerPrice": {{"$lt": 100}}}}
- "out of stock items" -> {{"status": "APPROVED", "stockQuantity": {{"$lte": 0}}}}
- "new products this month" -> {{"status": "APPROVED", "createdAt": {{"$gte": "2025-08-01"}}}}

User question: {question}
Filter:"#
    )
}

/// System role for the store assistant
pub(crate) const ASSISTANT_SYSTEM: &str = "You are an intelligent assistant for grocery store managers.

Your role is to help store managers understand their business data and provide actionable insights.

Guidelines:
- Be conversational and helpful
- Provide specific, actionable advice
- Keep responses concise (under 100 words)
- Focus on business value and practical solutions
- Use data to support your recommendations";

/// Query-answer prompt over found products and categories
pub(crate) fn answer_prompt(
    query: &str,
    store_id: &str,
    products_count: usize,
    categories_count: usize,
    sample_data: &serde_json::Value,
) -> String {
    format!(
        r#"You are analyzing a store manager's search query to provide helpful information.

User Query: "{query}"
Store ID: {store_id}
Database Results Summary:
- Products found: {products_count}
- Categories found: {categories_count}
- Sample data: {sample_data}

Based on the query and available data, provide a natural, helpful response that:
1. Directly answers the user's question
2. Highlights relevant findings from the data
3. Offers actionable insights when appropriate
4. Suggests next steps if helpful

Keep the response conversational, informative, and under 150 words."#
    )
}

/// System role for substitute suggestions
pub(crate) const SUBSTITUTION_SYSTEM: &str = "You are an expert in product recommendations for grocery stores.
Analyze the given product and alternatives to suggest the best substitutions for customers.
Focus on customer satisfaction, similar value, and business benefit.";

/// Substitute request over shown alternatives
pub(crate) fn substitution_prompt(top_n: usize, product_info: &str, alternatives: &str) -> String {
    format!(
        r#"Suggest the best {top_n} product alternatives:

Original Product: {product_info}
Available Options: {alternatives}

Return JSON array with {top_n} best substitutes:
[{{"product_id": "id", "product_name": "name", "similarity_score": 0.9, "price_difference": -5, "reason": "why good substitute"}}]

Use only product ids from the available options. Consider category similarity, price range, and customer acceptance."#
    )
}

/// System role for discount strategy
pub(crate) const DISCOUNT_SYSTEM: &str = "You are a retail pricing expert specializing in grocery stores.
Provide practical discount strategies that balance revenue optimization with inventory clearance.";

/// Discount strategy request
pub(crate) fn discount_prompt(performance_summary: &serde_json::Value, old_products_count: usize) -> String {
    format!(
        r#"Create discount strategy for store manager:

Performance Data: {performance_summary}
Inventory Issues: {old_products_count} products over 30 days old

Provide advice in JSON format:
{{
  "strategy": "overall approach",
  "quick_actions": ["action 1", "action 2", "action 3"],
  "discount_suggestions": [
    {{"category": "old stock", "discount": "20-30%", "reason": "clear inventory"}},
    {{"category": "slow movers", "discount": "10-15%", "reason": "boost sales"}}
  ]
}}

Focus on practical, profitable strategies."#
    )
}

/// System role for per-product stock advice
pub(crate) const STOCK_SYSTEM: &str = "You are a retail analytics strategist.";

/// Stock recommendation request for one product
pub(crate) fn stock_prompt(
    product_name: &str,
    mrp_price: f64,
    offer_price: f64,
    pos_price: Option<f64>,
    stock_quantity: i64,
) -> String {
    let pos = pos_price.map_or_else(|| "unknown".to_string(), |p| p.to_string());
    format!(
        r"Given the following product data:
- Product Name: {product_name}
- MRP Price: {mrp_price}
- Offer Price: {offer_price}
- POS Price: {pos}
- Stock Quantity: {stock_quantity}

TASK:
1. Analyse pricing, demand likelihood, and stock levels.
2. Recommend ONE very specific action to improve sales or optimize inventory.
3. Provide a short, crisp reasoning.

Output strictly in JSON with keys: recommendation, reasoning."
    )
}

pub(crate) const NO_RESULTS: &str =
    "I couldn't find specific results for '{query}'. Try different keywords or check if the items are available in your inventory.";
pub(crate) const PRODUCTS_FOUND: &str =
    "Found {count} products for '{query}'. Top results: {products}. Would you like more details?";
pub(crate) const CATEGORIES_FOUND: &str =
    "Found {count} categories for '{query}': {categories}. These contain various products for your customers.";
pub(crate) const CATEGORIES_FROM_PRODUCTS: &str =
    "Based on your available products, here are the categories in your store: {categories}. These represent the main product groups your customers can find.";

/// Fill `{name}` placeholders
pub(crate) fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |text, (name, value)| {
        text.replace(&format!("{{{name}}}"), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_prompt_embeds_question() {
        let prompt = filter_prompt("cheap rice");
        assert!(prompt.contains("User question: cheap rice"));
        assert!(prompt.contains(r#"{"$gt": 500}"#));
    }

    #[test]
    fn render_fills_placeholders() {
        let text = render(PRODUCTS_FOUND, &[("count", "2"), ("query", "rice"), ("products", "A, B")]);
        assert_eq!(
            text,
            "Found 2 products for 'rice'. Top results: A, B. Would you like more details?"
        );
    }

    #[test]
    fn stock_prompt_handles_missing_pos() {
        assert!(stock_prompt("Oil", 120.0, 99.5, None, 40).contains("POS Price: unknown"));
    }
}
